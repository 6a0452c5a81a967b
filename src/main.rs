use securescaffold::app::App;
use securescaffold::app_config::configure_secret_key;
use securescaffold::config::Settings;
use securescaffold::startup;
use securescaffold::utils::logger::init_logging;
use tracing::error;

#[tokio::main]
async fn main() {
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&settings.logging) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let mut app = match App::with_settings(env!("CARGO_PKG_NAME"), settings) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to create app: {}", e);
            std::process::exit(1);
        }
    };

    if configure_secret_key(&mut app).await.is_err() {
        // Already logged by configure_secret_key.
        std::process::exit(1);
    }

    if let Err(e) = startup::run(app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
