use std::fs;

use crate::extractor::{
    PageExtractor, Platform,
    bilibili::BilibiliExtractor,
    generic::GenericExtractor,
    wechat::WechatExtractor,
    xiaohongshu::{DELETED_MESSAGE, LOGIN_MESSAGE, XiaohongshuExtractor},
};

fn fixture(name: &str) -> String {
    fs::read_to_string(format!("src/extractor/tests/fixtures/{name}"))
        .expect("Failed to read test fixture")
}

fn assert_images_pass_filter(extractor: &dyn PageExtractor, url: &str, images: &[String]) {
    let filter = extractor.image_filter(url);
    for image in images {
        assert!(filter.is_content_image(image), "{image} failed the image filter");
    }
}

#[test]
fn test_xiaohongshu_note_stops_at_meta_images() {
    let url = "https://www.xiaohongshu.com/explore/6704f1a2000000001b0212c4";
    let extractor = XiaohongshuExtractor::new();
    let content = extractor.extract(&fixture("xiaohongshu_note.html"), url);

    assert_eq!(content.platform(), Platform::Xiaohongshu);
    assert_eq!(content.title(), "秋天的第一杯咖啡，在家也能做出店里的味道");
    assert!(content.body().contains("摩卡壶萃取浓缩"));
    assert!(!content.body().contains("点赞"));
    assert_eq!(content.images().len(), 4);
    assert!(content.images().iter().all(|i| !i.contains("extra-slide")));
    assert!(content.images()[2].starts_with("https://sns-webpic-qc.xhscdn.com/"));
    assert_images_pass_filter(&extractor, url, content.images());
    assert_eq!(content.author(), Some("咖啡小馆主"));
    assert_eq!(
        content.published_at().map(|d| d.format("%Y-%m-%d").to_string()),
        Some("2024-10-08".to_string())
    );
    assert_eq!(content.source_url(), url);
}

#[test]
fn test_xiaohongshu_deleted_page_yields_deleted_message() {
    let content = XiaohongshuExtractor::new().extract(
        &fixture("xiaohongshu_deleted.html"),
        "https://www.xiaohongshu.com/explore/gone",
    );

    assert_eq!(content.body(), DELETED_MESSAGE);
    assert_eq!(content.title(), "小红书笔记");
}

#[test]
fn test_xiaohongshu_login_wall_yields_login_message() {
    let content = XiaohongshuExtractor::new().extract(
        &fixture("xiaohongshu_login.html"),
        "https://www.xiaohongshu.com/explore/locked",
    );

    assert_eq!(content.body(), LOGIN_MESSAGE);
    assert!(content.images().is_empty());
}

#[test]
fn test_bilibili_video() {
    let url = "https://www.bilibili.com/video/BV1xx411c7mD";
    let extractor = BilibiliExtractor::new();
    let content = extractor.extract(&fixture("bilibili_video.html"), url);

    assert_eq!(content.title(), "手把手教你写一个 Rust 异步运行时");
    assert!(content.body().starts_with("从零开始实现 executor"));
    assert_eq!(
        content.images().to_vec(),
        vec!["https://i0.hdslb.com/bfs/archive/5f2c1f0e6b7a.jpg".to_string()]
    );
    assert_images_pass_filter(&extractor, url, content.images());
    assert_eq!(content.author(), Some("编程的小明"));
    assert_eq!(content.published_at().map(|d| d.timestamp()), Some(1_700_000_000));
}

#[test]
fn test_wechat_article() {
    let url = "https://mp.weixin.qq.com/s/AbCdEf123";
    let extractor = WechatExtractor::new();
    let content = extractor.extract(&fixture("wechat_article.html"), url);

    assert_eq!(content.title(), "城市更新的十个观察");
    assert!(content.body().contains("口袋公园"));
    assert!(!content.body().contains("长按二维码"));
    assert_eq!(content.images().len(), 2);
    assert!(content.images().iter().all(|i| !i.contains("qrcode")));
    assert_images_pass_filter(&extractor, url, content.images());
    assert_eq!(content.author(), Some("城市笔记"));
    assert_eq!(
        content.published_at().map(|d| d.format("%Y-%m-%d").to_string()),
        Some("2024-05-20".to_string())
    );
}

#[test]
fn test_generic_blog_post() {
    let url = "https://blog.example.com/post";
    let content = GenericExtractor::default().extract(&fixture("blog.html"), url);

    assert_eq!(content.platform(), Platform::Unknown);
    assert_eq!(content.title(), "How to Build Better Software");
    assert!(content.body().contains("Key Principles"));
    assert!(!content.body().contains("Popular posts"));
    assert_eq!(
        content.images().to_vec(),
        vec!["https://blog.example.com/images/diagram.png".to_string()]
    );
    assert_eq!(content.author(), Some("Jane Doe"));
    assert!(content.published_at().is_some());
}

#[test]
fn test_extraction_is_idempotent() {
    let cases: Vec<(Box<dyn PageExtractor>, &str, &str)> = vec![
        (
            Box::new(XiaohongshuExtractor::new()),
            "xiaohongshu_note.html",
            "https://www.xiaohongshu.com/explore/1",
        ),
        (
            Box::new(BilibiliExtractor::new()),
            "bilibili_video.html",
            "https://www.bilibili.com/video/BV1",
        ),
        (
            Box::new(WechatExtractor::new()),
            "wechat_article.html",
            "https://mp.weixin.qq.com/s/1",
        ),
        (Box::new(GenericExtractor::default()), "blog.html", "https://blog.example.com/post"),
    ];

    for (extractor, name, url) in cases {
        let html = fixture(name);
        assert_eq!(extractor.extract(&html, url), extractor.extract(&html, url), "{name}");
    }
}

#[test]
fn test_malformed_html() {
    let html = "<html><head><title>Broken page title</title><body><p>Unclosed tags<div>More content";
    let content = GenericExtractor::default().extract(html, "https://example.com/broken");

    assert_eq!(content.title(), "Broken page title");
    assert_eq!(content.body(), "无法提取内容");
}

#[test]
fn test_empty_document_gets_platform_placeholders() {
    for platform in Platform::SUPPORTED {
        let extractor = crate::extractor::platform_extractor(platform).unwrap();
        let content = extractor.extract("", "https://example.com/");
        assert_eq!(content.title(), platform.placeholder_title());
        assert_eq!(content.body(), platform.placeholder_body());
        assert!(content.images().is_empty());
    }
}

#[cfg(feature = "fuzz")]
mod fuzz {
    use super::*;
    use crate::extractor::images::MAX_IMAGES;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_extract_never_panics(
            html in ".*",
            url in "https://[a-z]+\\.com/.*"
        ) {
            for platform in Platform::SUPPORTED {
                let extractor = crate::extractor::platform_extractor(platform).unwrap();
                let content = extractor.extract(&html, &url);
                prop_assert!(content.images().len() <= MAX_IMAGES);
                prop_assert!(!content.title().is_empty());
            }
            let _ = GenericExtractor::default().extract(&html, &url);
        }

        #[test]
        fn test_images_always_pass_filter(
            srcs in proptest::collection::vec("(https?:)?//[a-z]{1,8}\\.(xhscdn|hdslb|example)\\.com/[a-z0-9/]{0,12}(\\.jpg|\\.js)?", 0..15)
        ) {
            let body: String = srcs.iter().map(|s| format!("<img src=\"{s}\">")).collect();
            let html = format!("<html><body>{body}</body></html>");
            let url = "https://www.example.com/";
            let extractors: Vec<Box<dyn PageExtractor>> = vec![
                Box::new(XiaohongshuExtractor::new()),
                Box::new(BilibiliExtractor::new()),
                Box::new(GenericExtractor::default()),
            ];
            for extractor in extractors {
                let content = extractor.extract(&html, url);
                let filter = extractor.image_filter(url);
                prop_assert!(content.images().iter().all(|i| filter.is_content_image(i)));
            }
        }
    }
}
