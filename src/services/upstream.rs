use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder};

pub const UA_DESKTOP: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36";
pub const UA_MOBILE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 9_1 like Mac OS X) AppleWebKit/601.1.46 (KHTML, like Gecko) Version/9.0 Mobile/13B143 Safari/601.1";

const REFERER_BILIBILI: &str = "https://www.bilibili.com/";
const REFERER_MIGU: &str = "http://music.migu.cn/";
const REFERER_QQ: &str = "http://y.qq.com";

/// Upstream headers that the relay derives itself and never copies through.
pub const EXCLUDED_RESPONSE_HEADERS: [HeaderName; 3] = [
    header::TRANSFER_ENCODING,
    header::DATE,
    header::ACCESS_CONTROL_ALLOW_ORIGIN,
];

/// User-Agent and Referer a platform's media hosts expect to see.
pub fn spoofed_identity(source: &str) -> (&'static str, Option<&'static str>) {
    match source {
        "bilibili" => (UA_DESKTOP, Some(REFERER_BILIBILI)),
        "migu" => (UA_MOBILE, Some(REFERER_MIGU)),
        "qq" => (UA_DESKTOP, Some(REFERER_QQ)),
        _ => (UA_DESKTOP, None),
    }
}

/// GET request for a media URL, dressed up the way `source` expects.
pub fn media_request(
    client: &Client,
    url: &str,
    source: &str,
    range: Option<&str>,
    credential: Option<&str>,
) -> RequestBuilder {
    let (user_agent, referer) = spoofed_identity(source);

    let mut request = client.get(url).header(header::USER_AGENT, user_agent);
    if let Some(range) = range.filter(|range| !range.is_empty()) {
        request = request.header(header::RANGE, range);
    }
    if let Some(referer) = referer {
        request = request.header(header::REFERER, referer);
    }
    if let Some(credential) = credential.filter(|credential| !credential.is_empty()) {
        request = request.header(header::COOKIE, credential);
    }
    request
}

/// Copy of the upstream response headers minus the excluded ones.
pub fn forwarded_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if EXCLUDED_RESPONSE_HEADERS.contains(name) {
            continue;
        }
        forwarded.append(name.clone(), value.clone());
    }
    forwarded
}

pub fn download_filename(name: &str, artist: &str, extension: &str) -> String {
    format!("{} - {}.{}", name, artist, extension)
}

/// `attachment` disposition carrying both a plain and an RFC 5987 filename.
pub fn content_disposition(filename: &str) -> HeaderValue {
    let encoded = urlencoding::encode(filename);
    let value = format!(
        "attachment; filename=\"{}\"; filename*=utf-8''{}",
        encoded, encoded
    );
    // Percent-encoding leaves only visible ASCII
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
