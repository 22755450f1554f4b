//! Harness that runs the development opportunity API on an ephemeral port.

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use board_server::{
    graphql::{OpportunityStore, build_schema},
    http::{AppState, serve_on},
};
use entity::OpportunityRecord;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};

pub struct TestApi {
    pub addr: SocketAddr,
    pub store: Arc<OpportunityStore>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<()>>,
}

impl TestApi {
    pub async fn start(records: Vec<OpportunityRecord>) -> Result<Self> {
        Self::with_store(OpportunityStore::new(records)).await
    }

    pub async fn with_store(store: OpportunityStore) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind ephemeral port")?;
        let addr = listener.local_addr()?;
        let store = Arc::new(store);
        let state = AppState {
            schema: build_schema(Arc::clone(&store)),
            store: Arc::clone(&store),
            cors_allowed_origins: Vec::new(),
        };
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(serve_on(listener, state, async move {
            let _ = rx.await;
        }));
        Ok(Self {
            addr,
            store,
            shutdown: Some(tx),
            handle,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}/graphql", self.addr)
    }

    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.context("server task panicked")?
    }
}
