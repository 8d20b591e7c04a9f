pub mod metadata;
pub mod rooms_service;

pub use rooms_service::RoomsServiceImpl;

use std::future::Future;
use std::net::SocketAddr;

use huddle_core::bootstrap::Services;
use huddle_proto::RoomsServiceServer;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::server::Router;
use tonic::transport::Server;

/// Router with the rooms service and the standard gRPC health service
pub async fn router(services: &Services) -> Router {
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<RoomsServiceServer<RoomsServiceImpl>>()
        .await;

    let rooms = RoomsServiceImpl::new(services.room_service.clone());

    Server::builder()
        .add_service(health_service)
        .add_service(RoomsServiceServer::new(rooms))
}

/// Build and run the gRPC server until `shutdown` resolves
pub async fn serve<F>(addr: SocketAddr, services: Services, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("gRPC server listening on {}", listener.local_addr()?);

    serve_with_listener(listener, services, shutdown).await
}

/// Run the gRPC server on an already bound listener
pub async fn serve_with_listener<F>(listener: TcpListener, services: Services, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send,
{
    router(&services)
        .await
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await?;

    tracing::info!("gRPC server shut down gracefully");
    Ok(())
}
