//! Login credentials and M3U-plus URL extraction

use crate::error::{AppError, AppResult};
use crate::models::StreamUrls;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub server: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(server: &str, username: &str, password: &str) -> Self {
        Self {
            server: server.trim().to_string(),
            username: username.trim().to_string(),
            password: password.trim().to_string(),
        }
    }

    /// Reject empty fields and normalise the server to `scheme://host[:port]` without a trailing slash
    pub fn validated(&self) -> AppResult<Credentials> {
        if self.server.is_empty() || self.username.is_empty() || self.password.is_empty() {
            return Err(AppError::Validation("Please fill in all fields to login".to_string()));
        }
        Ok(Credentials {
            server: normalize_server(&self.server),
            username: self.username.clone(),
            password: self.password.clone(),
        })
    }

    /// Extract credentials from an M3U plus URL.
    /// Format: http://server/get.php?username=XXX&password=YYY&type=m3u_plus
    pub fn from_m3u_url(url: &str) -> AppResult<Credentials> {
        let url = url.trim();
        extract_from_query(url)
            .or_else(|| extract_from_path(url))
            .ok_or_else(|| AppError::Validation("M3U plus URL is invalid".to_string()))
    }

    pub fn stream_urls(&self) -> StreamUrls {
        StreamUrls {
            server: self.server.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

pub fn normalize_server(server: &str) -> String {
    let server = server.trim().trim_end_matches('/');
    if server.starts_with("http://") || server.starts_with("https://") {
        server.to_string()
    } else {
        format!("http://{}", server)
    }
}

fn server_part(url: &str) -> Option<String> {
    let proto_end = url.find("://")?;
    let rest = &url[proto_end + 3..];
    let host_end = rest.find(['/', '?']).unwrap_or(rest.len());
    if host_end == 0 {
        return None;
    }
    Some(url[..proto_end + 3 + host_end].to_string())
}

fn extract_from_query(url: &str) -> Option<Credentials> {
    let (base, query) = url.split_once('?')?;
    if !base.ends_with("/get.php") {
        return None;
    }

    let params: HashMap<&str, &str> = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .collect();

    let username = params.get("username").filter(|v| !v.is_empty())?;
    let password = params.get("password").filter(|v| !v.is_empty())?;

    Some(Credentials {
        server: server_part(url)?,
        username: decode(username),
        password: decode(password),
    })
}

fn extract_from_path(url: &str) -> Option<Credentials> {
    // Pattern: http://server/live/username/password/channel.ts
    let server = server_part(url)?;
    let path = &url[server.len()..];
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if segments.len() >= 4 && ["live", "movie", "series"].contains(&segments[0].to_lowercase().as_str()) {
        return Some(Credentials {
            server,
            username: decode(segments[1]),
            password: decode(segments[2]),
        });
    }
    None
}

fn decode(value: &str) -> String {
    urlencoding::decode(value)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_m3u_plus_credentials() {
        let url = "http://example.com:8080/get.php?username=john&password=secret&type=m3u_plus";
        let creds = Credentials::from_m3u_url(url).unwrap();
        assert_eq!(creds.server, "http://example.com:8080");
        assert_eq!(creds.username, "john");
        assert_eq!(creds.password, "secret");
    }

    #[test]
    fn test_extract_path_credentials() {
        let url = "https://example.com/live/myuser/mypass/123.ts";
        let creds = Credentials::from_m3u_url(url).unwrap();
        assert_eq!(creds.server, "https://example.com");
        assert_eq!(creds.username, "myuser");
        assert_eq!(creds.password, "mypass");
    }

    #[test]
    fn test_invalid_m3u_url() {
        assert!(Credentials::from_m3u_url("http://example.com/playlist.m3u").is_err());
        assert!(Credentials::from_m3u_url("not a url").is_err());
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            Credentials::new("h", "", "p").validated(),
            Err(AppError::Validation(_))
        ));
        let creds = Credentials::new(" example.com/ ", "u", "p").validated().unwrap();
        assert_eq!(creds.server, "http://example.com");
    }
}
