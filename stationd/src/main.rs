use config::options::{get_args, Options};
use input::RecordLines;
use stationstore::{ManagerError, Schema, WriteManager};

mod config;
mod input;

const EXIT_CONFIG: i32 = 2;
const EXIT_SINK: i32 = 3;

fn main() {
    let args = get_args();

    env_logger::Builder::from_env(
        env_logger::Env::default()
            .default_filter_or(&args.log_level)
            .default_write_style_or(&args.log_level),
    )
    .init();

    log::info!("args: {:?}", args);

    let code = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime can be made")
        .block_on(run_store(args));
    std::process::exit(code)
}

async fn run_store(args: Options) -> i32 {
    let schema = match Schema::new(args.schema_fields()) {
        Ok(schema) => schema,
        Err(e) => {
            log::error!("bad schema: {e}");
            return EXIT_CONFIG;
        }
    };
    let store_config = match args.store_config() {
        Ok(store_config) => store_config,
        Err(e) => {
            log::error!("bad configuration: {e}");
            return EXIT_CONFIG;
        }
    };

    let mut manager =
        match WriteManager::from_config(schema.clone(), &store_config, args.manager_options())
            .await
        {
            Ok(manager) => manager,
            Err(ManagerError::Config(e)) => {
                log::error!("bad configuration: {e}");
                return EXIT_CONFIG;
            }
            Err(e) => {
                log::error!("failed to open data storage: {e}");
                return EXIT_SINK;
            }
        };
    log::info!("storing records to {:?}", manager.enabled());

    let cancel = manager.cancellation_token();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("interrupted, stopping");
            interrupt.cancel();
        }
    });

    let mut records = RecordLines::new(tokio::io::stdin(), schema);
    let code = loop {
        let record = tokio::select! {
            _ = cancel.cancelled() => break 0,
            record = records.next_record() => record,
        };
        let Some(record) = record else {
            log::info!("end of input");
            break 0;
        };
        match manager.update(record).await {
            Ok(report) => {
                for sink in &report.sinks {
                    if sink.deferred {
                        log::info!("{}: {} record(s) waiting", sink.kind, sink.backlog);
                    } else {
                        log::debug!("{}: committed {}", sink.kind, sink.committed);
                    }
                }
            }
            Err(e) => {
                log::error!("stopping on sink failure: {e}");
                break EXIT_SINK;
            }
        }
    };

    for kind in manager.enabled() {
        if let Some(depth) = manager.queue_depth(kind).filter(|depth| *depth > 0) {
            log::warn!("{kind}: {depth} record(s) were never stored");
        }
    }
    code
}
