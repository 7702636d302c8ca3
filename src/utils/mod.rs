use std::path::PathBuf;

pub fn get_app_data_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => {
            let mut path = PathBuf::from(home);
            path.push(".local/share/cp-tracker");
            path
        }
        None => PathBuf::from("data"),
    }
}

pub fn get_database_path() -> PathBuf {
    let mut path = get_app_data_dir();
    path.push("cp-tracker.db");
    path
}
