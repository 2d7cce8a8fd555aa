//! Reading asset files: from disk natively, over HTTP in the browser.

/// Directory asset paths are resolved against natively.
#[cfg(not(target_arch = "wasm32"))]
pub const ASSET_ROOT_ENV: &str = "ROOM_NGIN_ASSETS";

/// Absolute `file_name`s are used as they are.
#[cfg(not(target_arch = "wasm32"))]
pub fn asset_path(file_name: &str) -> std::path::PathBuf {
    let root = std::env::var_os(ASSET_ROOT_ENV)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::path::Path::new("./").join("assets"));
    root.join(file_name)
}

/// Resolves `file_name` against `<origin>/assets/`.
#[cfg(target_arch = "wasm32")]
pub fn asset_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    use anyhow::Context as _;

    let window = web_sys::window().context("No browser window")?;
    let origin = window
        .location()
        .origin()
        .map_err(|e| anyhow::anyhow!("No page origin: {e:?}"))?;
    let base = reqwest::Url::parse(&format!("{origin}/assets/"))?;
    Ok(base.join(file_name)?)
}

pub async fn load_binary(file_name: &str) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = asset_url(file_name)?;
        let response = reqwest::get(url).await?.error_for_status()?;
        response.bytes().await?.to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        use anyhow::Context as _;

        let path = asset_path(file_name);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Unable to read {}", path.display()))?
    };

    Ok(data)
}

/// The lowercase extension of `path`, used as a decoder hint.
pub fn extension(path: &str) -> Option<String> {
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

/// The file name of `path` without directories or extensions.
pub fn stem(path: &str) -> &str {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.split('.').next().unwrap_or(file)
}

/// Resolves a URI found inside the file at `path` relative to its directory.
pub fn sibling(path: &str, uri: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/{uri}"),
        None => uri.to_string(),
    }
}
