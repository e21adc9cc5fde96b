use actix_web::{web, App, HttpServer};
use photofeed::config::Config;
use photofeed::{handlers, AppState};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("photofeed=info"))?)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        );
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let config = Config::from_env();
    tracing::info!(
        database = %config.database_url,
        uploads = %config.upload_dir.display(),
        session_hours = config.session_expiration_hours,
        "starting photofeed"
    );

    let state = AppState::new(config.clone())?;
    tracing::info!("database ready");

    let bind = (config.host.clone(), config.port);
    tracing::info!("listening on http://{}:{}", bind.0, bind.1);

    let data = web::Data::new(state);
    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .configure(handlers::configure)
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}
