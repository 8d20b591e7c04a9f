// Messages that carry fields; missing JSON fields decode to their proto defaults.
const MESSAGES: &[&str] = &[
    "CreateRoomResponse",
    "NewRoomNotification",
    "Ping",
    "Pong",
    "User",
    "RoomUsers",
    "SendMessage",
    "MessageReceived",
    "SdpEntry",
    "SendSdp",
    "SdpReceived",
    "RoomMethod",
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    let mut builder = tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .type_attribute(".", "#[derive(serde::Serialize, serde::Deserialize)]")
        .type_attribute(".huddle.rooms.RoomMethod.method", "#[serde(rename_all = \"snake_case\")]");
    for message in MESSAGES {
        builder = builder.message_attribute(format!(".huddle.rooms.{message}"), "#[serde(default)]");
    }
    builder.compile_protos(&["../proto/rooms.proto"], &["../proto"])?;

    println!("cargo:rerun-if-changed=../proto/rooms.proto");

    Ok(())
}
