use actix_web::{middleware, App, HttpServer};
use anyhow::Context;
use imgclassify::config::Settings;
use imgclassify::{server, startup};
use std::path::PathBuf;
use std::{env, process};

use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: ./imgclassify [config file]";

fn get_args() -> Option<PathBuf> {
    let args: Vec<String> = env::args().collect();
    if args.len() > 2 {
        println!("{USAGE}");
        process::exit(1);
    }

    args.get(1).map(PathBuf::from)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config_file = get_args();
    let settings = Settings::load(config_file.as_deref()).context("failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Fail before binding if the model or labels are unusable
    let state = startup::build_state(&settings).context("failed to load classifier")?;

    info!(
        "serving {} classes on {}:{}",
        state.classes, settings.host, settings.port
    );

    let mut http = HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .configure(server::configure(state.clone()))
    });
    if let Some(workers) = settings.workers {
        http = http.workers(workers);
    }

    http.bind((settings.host.as_str(), settings.port))?
        .run()
        .await?;
    Ok(())
}
