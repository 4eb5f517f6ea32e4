#![no_main]

use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

use notelink::{
    extractor::{GenericExtractor, PageExtractor, detect_platform, images::MAX_IMAGES, platform_extractor},
    share_text::find_share_url,
};

const URLS: &[&str] = &[
    "https://www.xiaohongshu.com/explore/6704f1a2000000001b0212c4",
    "https://www.bilibili.com/video/BV1xx411c7mD",
    "https://mp.weixin.qq.com/s/AbCdEf123",
    "https://blog.example.com/post",
];

fuzz_target!(|data: &[u8]| {
    let html = String::from_utf8_lossy(data);

    // Extraction must never panic and must keep its output invariants.
    for url in URLS {
        let extractor: Arc<dyn PageExtractor> = platform_extractor(detect_platform(url))
            .unwrap_or_else(|| Arc::new(GenericExtractor::default()));
        let content = extractor.extract(&html, url);
        assert!(content.images().len() <= MAX_IMAGES);
        assert!(!content.title().is_empty());
        let filter = extractor.image_filter(url);
        assert!(content.images().iter().all(|i| filter.is_content_image(i)));
    }

    let _ = detect_platform(&html);
    let _ = find_share_url(&html);
});
