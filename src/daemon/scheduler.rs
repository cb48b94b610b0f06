use super::{check_updates, TaskError};
use crate::{config::Config, misc::format_error};
use std::{path::PathBuf, sync::Arc};
use tokio::{
    signal::unix::{signal, SignalKind},
    time::{interval, MissedTickBehavior},
};

/// Checks for updates on a fixed interval until interrupted or terminated.
///
/// Each check runs to completion before the next tick is taken, so checks never overlap.
pub fn run_scheduler(config: Config, config_path: PathBuf) -> Result<(), TaskError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(TaskError::Runtime)?;

    runtime.block_on(schedule(Arc::new(config), Arc::new(config_path)))
}

async fn schedule(config: Arc<Config>, config_path: Arc<PathBuf>) -> Result<(), TaskError> {
    let mut terminate = signal(SignalKind::terminate()).map_err(TaskError::Runtime)?;

    let period = config.poll_interval();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("checking for updates every {} seconds", period.as_secs());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let cycle = tokio::task::spawn_blocking(enclose!((config, config_path) move || {
                    check_updates(&config, &config_path)
                }));

                match cycle.await {
                    Ok(Ok(packages)) => info!("update check found {} packages", packages.len()),
                    Ok(Err(why)) => error!("{}", format_error(&why)),
                    Err(why) => error!("update check did not complete: {}", why),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted; stopping the scheduler");
                break;
            }
            _ = terminate.recv() => {
                info!("terminated; stopping the scheduler");
                break;
            }
        }
    }

    Ok(())
}
