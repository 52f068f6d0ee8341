/// Ordered link rules, first match wins. Short-link hosts sit next to the
/// domain they expand to so they are never shadowed by a broader pattern.
const LINK_RULES: &[(&[&str], &str)] = &[
    (&["163.com"], "netease"),
    (&["qq.com"], "qq"),
    (&["kugou.com"], "kugou"),
    (&["kuwo.cn"], "kuwo"),
    (&["migu.cn"], "migu"),
    (&["b23.tv", "bilibili.com"], "bilibili"),
    (&["douyin.com", "qishui"], "soda"),
    (&["5sing"], "fivesing"),
    (&["jamendo.com"], "jamendo"),
];

/// Source identifier a share link belongs to, `None` when unrecognized.
pub fn classify_link(link: &str) -> Option<&'static str> {
    LINK_RULES
        .iter()
        .find(|(patterns, _)| patterns.iter().any(|pattern| link.contains(pattern)))
        .map(|(_, source)| *source)
}

/// Whether a search keyword should be treated as a link rather than a query.
pub fn looks_like_link(keyword: &str) -> bool {
    keyword.starts_with("http")
}
