use std::time::Duration;

/// A client identity presented to the site: user agent, viewport and headers.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProfile {
    pub name: &'static str,
    pub user_agent: &'static str,
    pub viewport: (u32, u32),
    pub device_scale_factor: f64,
    pub mobile: bool,
    pub headers: &'static [(&'static str, &'static str)],
}

pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(8);
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(3);

const MOBILE_HEADERS: &[(&str, &str)] = &[
    ("Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8"),
    ("Sec-Fetch-Dest", "document"),
    ("Sec-Fetch-Mode", "navigate"),
    ("Sec-Fetch-Site", "none"),
];

const DESKTOP_HEADERS: &[(&str, &str)] = &[
    ("Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8"),
    ("Sec-Ch-Ua-Platform", "\"Windows\""),
    ("Sec-Fetch-Dest", "document"),
    ("Sec-Fetch-Mode", "navigate"),
];

pub const IPHONE_SAFARI: DeviceProfile = DeviceProfile {
    name: "iphone_safari",
    user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1",
    viewport: (390, 844),
    device_scale_factor: 3.0,
    mobile: true,
    headers: MOBILE_HEADERS,
};

pub const ANDROID_CHROME: DeviceProfile = DeviceProfile {
    name: "android_chrome",
    user_agent: "Mozilla/5.0 (Linux; Android 13; SM-G991B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Mobile Safari/537.36",
    viewport: (384, 854),
    device_scale_factor: 2.75,
    mobile: true,
    headers: MOBILE_HEADERS,
};

pub const DESKTOP_CHROME: DeviceProfile = DeviceProfile {
    name: "desktop_chrome",
    user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    viewport: (1920, 1080),
    device_scale_factor: 1.0,
    mobile: false,
    headers: DESKTOP_HEADERS,
};

/// Tried in order until one is not bounced to a login page.
pub fn default_profiles() -> Vec<DeviceProfile> {
    vec![IPHONE_SAFARI, ANDROID_CHROME, DESKTOP_CHROME]
}

/// Injected before any page script; hides the usual automation fingerprints.
pub const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
Object.defineProperty(navigator, 'languages', { get: () => ['zh-CN', 'zh', 'en'] });
window.chrome = window.chrome || { runtime: {} };
const originalQuery = window.navigator.permissions && window.navigator.permissions.query;
if (originalQuery) {
  window.navigator.permissions.query = (parameters) =>
    parameters.name === 'notifications'
      ? Promise.resolve({ state: Notification.permission })
      : originalQuery(parameters);
}
"#;

pub const LAUNCH_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-blink-features=AutomationControlled",
    "--no-first-run",
    "--no-default-browser-check",
    "--lang=zh-CN",
];
