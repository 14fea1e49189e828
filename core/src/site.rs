//! The only site-specific logic in the system: how a chapter number becomes
//! a chapter URL. One site is supported; the trait keeps it swappable.

pub trait Site: Send + Sync {
    fn id(&self) -> &'static str;

    /// Forms a chapter URL from the series base URL and a chapter number.
    fn chapter_url(&self, base_url: &str, chapter_number: u32) -> String;
}

/// Syosetu-style numbering: `{base}/{n}/` with any trailing slash stripped
/// from the base first.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyosetuSite;

impl Site for SyosetuSite {
    fn id(&self) -> &'static str {
        "syosetu"
    }

    fn chapter_url(&self, base_url: &str, chapter_number: u32) -> String {
        let base = base_url.trim().trim_end_matches('/');
        format!("{base}/{chapter_number}/")
    }
}
