use crate::transmit::{AnnotatedFrame, Transmit};
use crate::Router;
use crossbeam::channel::Receiver;
use std::io;
use std::sync::Arc;
use tokio::runtime;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::debug;

/// Sweeps the router's ARP cache every `sweep_interval` for as long as the runtime lives, or
/// until the handle is aborted. The first sweep runs immediately.
///
/// Panics if the configured `sweep_interval` is zero.
pub fn spawn_sweeper<T: Transmit + 'static>(router: Arc<Router<T>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(router.config().sweep_interval);
        loop {
            let tick = interval.tick().await;
            router.sweep(tick.into_std());
        }
    })
}

/// Feeds every frame from `receiver` to the router on a blocking thread. The task ends once all
/// senders are dropped and the channel is drained.
pub fn spawn_ingress<T: Transmit + 'static>(
    router: Arc<Router<T>>,
    receiver: Receiver<AnnotatedFrame>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        for AnnotatedFrame { interface, frame } in receiver.iter() {
            router.handle_frame(&frame, &interface);
        }
    })
}

/// Runs `router` on a new multi threaded runtime, one ingress pump per receiver plus the sweep
/// task, and blocks until every ingress channel has closed. In production the ingress channels
/// never close so this never returns; tests close them to shut the router down.
pub fn run_router<T: Transmit + 'static>(
    router: Router<T>,
    ingress_receivers: Vec<Receiver<AnnotatedFrame>>,
) -> io::Result<()> {
    let runtime = runtime::Builder::new_multi_thread().enable_all().build()?;

    runtime.block_on(async {
        let router = Arc::new(router);
        let sweeper = spawn_sweeper(router.clone());

        let pumps: Vec<JoinHandle<()>> = ingress_receivers
            .into_iter()
            .map(|receiver| spawn_ingress(router.clone(), receiver))
            .collect();
        for pump in pumps {
            if let Err(err) = pump.await {
                debug!(%err, "runner: ingress pump stopped");
            }
        }

        sweeper.abort();
    });
    Ok(())
}
