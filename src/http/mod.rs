//! Local HTTP listener for the OAuth redirect
//!
//! Bound for one authorization attempt and torn down by the token provider:
//! - GET /?code=... - Exchange the authorization code
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::CallbackParams;
pub use routes::create_router;
pub use state::CallbackState;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::auth::TokenProvider;

/// How long `shutdown` waits for in-flight requests
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// A running callback server
pub struct CallbackListener {
    addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl CallbackListener {
    /// Bind `addr` and start serving in the background
    pub async fn bind(addr: SocketAddr, provider: Arc<dyn TokenProvider>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;

        let router = create_router(CallbackState::new(provider));
        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await;
            if let Err(e) = result {
                error!("OAuth callback server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            shutdown,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait briefly for the server to exit
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if tokio::time::timeout(SHUTDOWN_GRACE, self.task).await.is_err() {
            warn!("OAuth callback server did not stop within {:?}", SHUTDOWN_GRACE);
        }
    }
}
