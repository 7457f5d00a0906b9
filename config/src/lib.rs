pub mod paths;
pub mod settings;

pub use paths::PathManager;
pub use settings::{AuthSettings, ChatSettings, RunpodSettings, Settings};

/// Load environment variables from .env files.
/// First loads from ~/.env (home directory), then from ./.env (working directory).
/// Call this before parsing CLI args so `env`-backed flags see the values.
pub fn load_env_file() {
    if let Some(home) = dirs::home_dir() {
        dotenv::from_path(home.join(".env")).ok();
    }

    // dotenv never overrides a variable that is already set, so the
    // working-directory file only fills in what the home file left out.
    dotenv::dotenv().ok();
}
