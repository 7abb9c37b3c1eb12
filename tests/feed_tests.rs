use newslink::errors::ResolverError;
use newslink::sources::{FeedSource, GoogleNewsSource};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOPIC_RSS: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Technology - Google News</title>
    <item>
      <title>New York Post hacked with offensive tweets - TechCrunch</title>
      <link>https://news.google.com/rss/articles/CBMiSGh0dHBzOi8vdGVjaGNydW5jaC5jb20vMjAyMi8xMC8yNy9uZXcteW9yay1wb3N0LWhhY2tlZC1vZmZlbnNpdmUtdHdlZXRzL9IBAA?oc=5</link>
      <pubDate>Thu, 27 Oct 2022 16:20:00 GMT</pubDate>
      <description>&lt;a href="https://news.google.com/rss/articles/CBMi"&gt;New York Post hacked with offensive tweets&lt;/a&gt;&amp;nbsp;&lt;font color="#6f6f6f"&gt;TechCrunch&lt;/font&gt;</description>
    </item>
    <item>
      <title>A story cluster - Example Wire</title>
      <link>https://news.google.com/stories/CAAqNggKIjBDQklTSGpvSmMzUnZjbmt0TXpZd1NoRUtEd2pq?hl=en-US</link>
    </item>
  </channel>
</rss>"##;

fn rss_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(TOPIC_RSS, "application/rss+xml; charset=utf-8")
}

#[tokio::test]
async fn test_extract_topic_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss/topics/CAAqJggK"))
        .respond_with(rss_response())
        .expect(1)
        .mount(&server)
        .await;

    let source = GoogleNewsSource::new();
    let items = source
        .extract(&format!("{}/topics/CAAqJggK?hl=en-US&gl=US&ceid=US:en", server.uri()))
        .await
        .unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].title, "New York Post hacked with offensive tweets");
    assert_eq!(items[0].source.as_deref(), Some("TechCrunch"));
    assert_eq!(
        items[0].decoded.as_deref(),
        Some("https://techcrunch.com/2022/10/27/new-york-post-hacked-offensive-tweets/")
    );
    assert!(items[1].token.is_story_cluster());
    assert_eq!(items[1].decoded, None);
}

#[tokio::test]
async fn test_not_found_retries_with_locale_params_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss/search"))
        .and(query_param("tbm", "nws"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rss/search"))
        .and(query_param("hl", "en-US"))
        .respond_with(rss_response())
        .with_priority(10)
        .expect(1)
        .mount(&server)
        .await;

    let source = GoogleNewsSource::new();
    let items = source
        .extract(&format!("{}/search?hl=en-US&tbm=nws", server.uri()))
        .await
        .unwrap();

    assert_eq!(items.len(), 2);
}

#[tokio::test]
async fn test_not_found_twice_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss/topics/Missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;

    let source = GoogleNewsSource::new();
    let err = source
        .extract(&format!("{}/topics/Missing?hl=en-US&oc=3", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, ResolverError::FeedNotFound(_)));
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss/topics/Broken"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let source = GoogleNewsSource::new();
    let err = source
        .extract(&format!("{}/topics/Broken?hl=en-US&oc=3", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, ResolverError::Network(_)));
}
