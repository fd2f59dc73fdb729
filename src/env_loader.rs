use std::env;
use std::path::PathBuf;

fn fallback_dotenv_path(hyshed_home: Option<PathBuf>, home_dir: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(base) = hyshed_home {
        return Some(base.join(".env"));
    }
    Some(home_dir?.join(".hyshed/.env"))
}

pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let fallback = fallback_dotenv_path(
        env::var_os("HYSHED_HOME").map(PathBuf::from),
        dirs::home_dir(),
    );

    let Some(path) = fallback else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}

#[cfg(test)]
mod tests {
    use super::fallback_dotenv_path;
    use std::path::PathBuf;

    #[test]
    fn fallback_prefers_hyshed_home() {
        let got = fallback_dotenv_path(
            Some(PathBuf::from("/workspace/hyshed")),
            Some(PathBuf::from("/home/alice")),
        );
        assert_eq!(got, Some(PathBuf::from("/workspace/hyshed/.env")));
    }

    #[test]
    fn fallback_uses_home_config_dir_when_hyshed_home_unset() {
        let got = fallback_dotenv_path(None, Some(PathBuf::from("/home/alice")));
        assert_eq!(got, Some(PathBuf::from("/home/alice/.hyshed/.env")));
    }

    #[test]
    fn no_fallback_without_any_home() {
        assert_eq!(fallback_dotenv_path(None, None), None);
    }
}
