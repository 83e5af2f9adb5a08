//! Identity extraction from listing and creation responses.

use std::collections::BTreeSet;

use reqwest::Url;
use reqwest::header::LOCATION;

use crate::definition::Identity;
use crate::transport::Response;
use crate::{Error, Result, link_header, uri};

/// Identities listed through `Link: <...>; rel="resource"` headers.
///
/// Each target is resolved against `base` (the definition URL); a response
/// without such links lists nothing.
pub fn extract_identities(response: &Response, base: &Url) -> Result<BTreeSet<Identity>> {
    link_header::from_headers(&response.headers)
        .into_iter()
        .filter(|link| link.relation.as_deref() == Some("resource"))
        .map(|link| {
            let target = uri::resolve_under(base, &link.target)?;
            let key = uri::relative_key(&target, base).ok_or_else(|| {
                Error::IdentityNotFound(format!("no identity in link target {target}"))
            })?;
            Identity::new(key)
        })
        .collect()
}

/// Identity of a freshly created resource, read from its `Location` header.
pub fn extract_identity(response: &Response, base: &Url) -> Result<Identity> {
    let mut locations = response.headers.get_all(LOCATION).iter();
    let (Some(location), None) = (locations.next(), locations.next()) else {
        return Err(Error::IdentityNotFound(
            "response must carry exactly one Location header".to_string(),
        ));
    };

    let location = location
        .to_str()
        .map_err(|_| Error::IdentityNotFound("Location header is not valid text".to_string()))?;
    let target = uri::resolve_under(base, location)?;

    uri::last_segment(&target)
        .ok_or_else(|| Error::IdentityNotFound(format!("no identity in location {target}")))
        .and_then(Identity::new)
}
