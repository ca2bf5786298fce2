use std::sync::LazyLock;

use regex::Regex;

use crate::config::Provider;

static VOE_HLS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"['"]hls['"]\s*:\s*['"]([^'"]+)['"]"#).expect("valid VOE regex")
});

static VIDOZA_SOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:<source\s+src=|sourcesCode:\s*\[\s*\{\s*src:\s*)"([^"]+)""#)
        .expect("valid Vidoza regex")
});

static STREAMTAPE_ROBOTLINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"getElementById\('robotlink'\)\.innerHTML\s*=\s*'([^']*)'\s*\+\s*\('([^']*)'\)((?:\.substring\(\d+\))*)"#,
    )
    .expect("valid Streamtape regex")
});

static SUBSTRING_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.substring\((\d+)\)").expect("valid substring regex"));

/// VOE serves a bounce page that redirects via script before the player loads
static SCRIPT_REDIRECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"window\.location\.href\s*=\s*['"]([^'"]+)['"]"#).expect("valid redirect regex")
});

fn streamtape_url(page: &str) -> Option<String> {
    let captures = STREAMTAPE_ROBOTLINK.captures(page)?;
    let head = captures.get(1)?.as_str();
    let tail = captures.get(2)?.as_str();
    let skip: usize = SUBSTRING_CALL
        .captures_iter(captures.get(3).map_or("", |m| m.as_str()))
        .filter_map(|c| c.get(1)?.as_str().parse::<usize>().ok())
        .sum();
    let tail = tail.get(skip..)?;
    Some(format!("https:{}{}", head, tail))
}

/// Locate the final media URL in a provider's embed page
pub fn extract_cache_url(provider: Provider, page: &str) -> Option<String> {
    let raw = match provider {
        Provider::Voe => VOE_HLS
            .captures(page)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string()),
        Provider::Vidoza => VIDOZA_SOURCE
            .captures(page)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string()),
        Provider::Streamtape => streamtape_url(page),
    }?;

    Some(html_escape::decode_html_entities(&raw).into_owned())
}

/// Target of a script-driven redirect, if the page is only a bounce page
pub fn script_redirect(page: &str) -> Option<String> {
    SCRIPT_REDIRECT
        .captures(page)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_voe_hls_url() {
        let page = r#"var sources = { 'hls': 'https://cdn.example/master.m3u8?t=1&amp;s=2', 'video_height': 1080 };"#;
        assert_eq!(
            extract_cache_url(Provider::Voe, page).as_deref(),
            Some("https://cdn.example/master.m3u8?t=1&s=2")
        );
    }

    #[test]
    fn extracts_vidoza_source() {
        let page = r#"<video><source src="https://str.vidoza.net/v.mp4" type="video/mp4"></video>"#;
        assert_eq!(
            extract_cache_url(Provider::Vidoza, page).as_deref(),
            Some("https://str.vidoza.net/v.mp4")
        );

        let page = r#"sourcesCode: [{ src: "https://str.vidoza.net/w.mp4", type: "video/mp4" }]"#;
        assert_eq!(
            extract_cache_url(Provider::Vidoza, page).as_deref(),
            Some("https://str.vidoza.net/w.mp4")
        );
    }

    #[test]
    fn extracts_streamtape_robotlink() {
        let page = r#"document.getElementById('robotlink').innerHTML = '//streamtape.com/get_video?id=abc' + ('xyz&expires=1&token=t').substring(1).substring(2);"#;
        assert_eq!(
            extract_cache_url(Provider::Streamtape, page).as_deref(),
            Some("https://streamtape.com/get_video?id=abc&expires=1&token=t")
        );
    }

    #[test]
    fn missing_pattern_yields_none() {
        assert_eq!(extract_cache_url(Provider::Voe, "<html></html>"), None);
        assert_eq!(extract_cache_url(Provider::Streamtape, "<html></html>"), None);
    }

    #[test]
    fn detects_script_redirect() {
        let page = r#"<script>window.location.href = 'https://voe-mirror.example/e/abc';</script>"#;
        assert_eq!(
            script_redirect(page).as_deref(),
            Some("https://voe-mirror.example/e/abc")
        );
    }
}
