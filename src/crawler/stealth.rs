//! Anti-detection scripts for rendered pages
//!
//! The evasion profile is data ([`EvasionConfig`]); this module only turns
//! it into the scripts injected before navigation and run after load.

use crate::config::EvasionConfig;

/// Builds the script evaluated on every new document before page scripts run
///
/// Returns None when evasion is disabled or every override is switched off.
pub fn evasion_script(config: &EvasionConfig) -> Option<String> {
    if !config.enabled {
        return None;
    }

    let mut parts = Vec::new();

    if config.hide_webdriver {
        parts.push(
            "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });".to_string(),
        );
    }

    if !config.languages.is_empty() {
        let languages =
            serde_json::to_string(&config.languages).unwrap_or_else(|_| "[]".to_string());
        parts.push(format!(
            "Object.defineProperty(navigator, 'languages', {{ get: () => {} }});",
            languages
        ));
    }

    if config.plugin_count > 0 {
        let plugins: Vec<String> = (1..=config.plugin_count).map(|i| i.to_string()).collect();
        parts.push(format!(
            "Object.defineProperty(navigator, 'plugins', {{ get: () => [{}] }});",
            plugins.join(", ")
        ));
    }

    if config.mask_notification_permission {
        parts.push(
            r#"if (navigator.permissions && navigator.permissions.query) {
    const originalQuery = navigator.permissions.query.bind(navigator.permissions);
    navigator.permissions.query = (parameters) => (
        parameters && parameters.name === 'notifications'
            ? Promise.resolve({ state: Notification.permission })
            : originalQuery(parameters)
    );
}"#
            .to_string(),
        );
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

/// Builds the scroll pass that walks the full document height in `steps` steps
///
/// Ends at the bottom of the page so lazy-loaded cards are requested.
pub fn scroll_script(steps: u32) -> String {
    let steps = steps.max(1);
    format!(
        r#"(() => {{
    const scrollHeight = document.body ? document.body.scrollHeight : 0;
    const steps = {steps};
    for (let i = 0; i <= steps; i++) {{
        window.scrollTo(0, i * (scrollHeight / steps));
    }}
    return scrollHeight;
}})()"#
    )
}
