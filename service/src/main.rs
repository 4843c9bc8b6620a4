use std::net::SocketAddr;

use shuttle_runtime::{CustomError, Error};
use shuttle_secrets::SecretStore;

use todo_service::{config::ServiceConfig, router, AppState};

pub struct AxumService(pub axum::Router);

#[shuttle_runtime::async_trait]
impl shuttle_runtime::Service for AxumService {
    async fn bind(mut self, addr: SocketAddr) -> Result<(), Error> {
        let tcp_listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(tcp_listener, self.0.into_make_service())
            .await
            .map_err(CustomError::new)?;

        Ok(())
    }
}

impl From<axum::Router> for AxumService {
    fn from(router: axum::Router) -> Self {
        Self(router)
    }
}

type PShuttleAxum = Result<AxumService, Error>;

#[shuttle_runtime::main]
async fn axum(#[shuttle_secrets::Secrets] secret_store: SecretStore) -> PShuttleAxum {
    let config = ServiceConfig::from_lookup(|key| secret_store.get(key)).map_err(CustomError::new)?;
    let app_state = AppState::from_config(&config)
        .await
        .map_err(CustomError::new)?;

    tracing::info!("todo service ready");
    Ok(router(app_state).into())
}
