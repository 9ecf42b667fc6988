use crate::UrlError;
use url::Url;

/// Placeholder substituted with the identifier when rendering a template
pub const ID_PLACEHOLDER: &str = "{id}";

/// Identifier probed while validating a template
const PROBE_ID: i64 = 1;

/// A request URL pattern with a single `{id}` slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    template: String,
}

impl UrlTemplate {
    /// Parses an explicit template such as `https://host/torrent/{id}`
    ///
    /// The template must contain the `{id}` placeholder and must render to an
    /// absolute HTTP(S) URL with a host.
    pub fn parse(template: &str) -> Result<Self, UrlError> {
        if !template.contains(ID_PLACEHOLDER) {
            return Err(UrlError::MissingPlaceholder(template.to_string()));
        }

        let probe = template.replace(ID_PLACEHOLDER, &PROBE_ID.to_string());
        let url = Url::parse(&probe).map_err(|e| UrlError::Parse(e.to_string()))?;
        check_http_url(&url)?;

        Ok(Self {
            template: template.to_string(),
        })
    }

    /// Derives a template from a mirror link
    ///
    /// Links that contain `/torrent/` map to `<scheme>://<host>/torrent/{id}`,
    /// everything else maps to `<scheme>://<host>/description.php?id={id}`.
    /// Only the scheme, host and port of the link are kept.
    ///
    /// # Examples
    ///
    /// ```
    /// use range_sweep::url::UrlTemplate;
    ///
    /// let template = UrlTemplate::from_mirror_link("https://mirror.example/torrent/77/foo").unwrap();
    /// assert_eq!(template.render(12), "https://mirror.example/torrent/12");
    /// ```
    pub fn from_mirror_link(link: &str) -> Result<Self, UrlError> {
        let url = Url::parse(link).map_err(|e| UrlError::Parse(e.to_string()))?;
        check_http_url(&url)?;

        let host = url.host_str().ok_or(UrlError::MissingHost)?;
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let template = if link.contains("/torrent/") {
            format!("{}://{}/torrent/{}", url.scheme(), authority, ID_PLACEHOLDER)
        } else {
            format!(
                "{}://{}/description.php?id={}",
                url.scheme(),
                authority,
                ID_PLACEHOLDER
            )
        };

        Ok(Self { template })
    }

    /// Renders the request URL for one identifier
    pub fn render(&self, id: i64) -> String {
        self.template.replace(ID_PLACEHOLDER, &id.to_string())
    }

    /// Returns the raw template string
    pub fn as_str(&self) -> &str {
        &self.template
    }
}

impl std::fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.template)
    }
}

fn check_http_url(url: &Url) -> Result<(), UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    Ok(())
}
