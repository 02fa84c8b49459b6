//! Copy-pasteable snippet rendering.
//!
//! Pure string templating: the GTM bridge script ships as a static
//! template with placeholder markers, the verification snippet is small
//! enough to format inline. Neither renderer owns any logic of its own —
//! the interesting behavior lives in the template content.

use crate::storage::VerificationRow;

const GTM_BRIDGE_TEMPLATE: &str = include_str!("templates/gtm_bridge.js");

/// Render the DataLayer-bridge script for one registered token.
///
/// `api_base_url` is the public `/api/v1` root of this daemon, without a
/// trailing slash — the script fetches `token-info` from it at runtime.
pub fn render_bridge_script(api_base_url: &str, gtm_container_id: &str, pixel_id: &str) -> String {
    GTM_BRIDGE_TEMPLATE
        .replace("{{CAPIFY_API_URL}}", api_base_url.trim_end_matches('/'))
        .replace("{{GTM_CONTAINER_ID}}", gtm_container_id)
        .replace("{{PIXEL_ID}}", pixel_id)
}

/// Render the HTML snippet a site embeds to prove domain ownership.
pub fn render_verification_snippet(verification: &VerificationRow) -> String {
    let token = &verification.verification_token;
    let container = &verification.gtm_container_id;
    let domain = &verification.domain_name;
    format!(
        r#"<!-- Capify GTM verification -->
<meta name="capify-verification-token" content="{token}">
<div id="capify-verification" style="display:none">{token}</div>
<script>
(function() {{
    'use strict';
    window.CAPIFY_VERIFICATION_TOKEN = '{token}';
    if (typeof window.dataLayer !== 'undefined') {{
        window.dataLayer.push({{
            'event': 'capify_verification',
            'capify_verification_token': '{token}',
            'gtm_container_id': '{container}',
            'domain': '{domain}'
        }});
    }}
}})();
</script>
"#
    )
}

// ─── Tests ────────────────────────────────────────────────────────────────────
