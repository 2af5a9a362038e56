//! End-to-end requests over a real socket

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Empty};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use penmark_conf::Settings;
use penmark_server::{HttpServer, JsonDataProvider, build_dispatcher};
use rstest::rstest;
use serde_json::json;
use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

struct Running {
	addr: SocketAddr,
	stop: oneshot::Sender<()>,
	task: tokio::task::JoinHandle<std::io::Result<()>>,
	_theme: TempDir,
}

async fn start() -> Running {
	let theme = TempDir::new().unwrap();
	fs::write(
		theme.path().join("home.html"),
		"<tag:BlogName/>:<tag:Entries>[<tag:EntryTitle/>]</tag:Entries>",
	)
	.unwrap();
	fs::write(
		theme.path().join("post.html"),
		"<tag:Entries><tag:EntryTitle/> in <tag:EntryCategory/></tag:Entries>",
	)
	.unwrap();
	fs::write(theme.path().join("404.html"), "nothing here").unwrap();

	let settings = Settings::from_value(json!({
		"blog_name": "Socket Blog",
		"blog_url": "http://blog.test/",
		"posts_per_page": 5,
		"theme_dirs": [theme.path()],
		"template_cache": "memory",
	}))
	.unwrap();
	let provider = JsonDataProvider::from_value(json!({
		"posts": [
			{"id": 1, "url": "hello", "title": "Hello", "date": "2024-03-01", "category": "news"},
			{"id": 2, "url": "again", "title": "Again", "date": "2024-03-02", "category": "news"},
		],
		"categories": [{"url": "news", "title": "News"}],
	}))
	.unwrap();
	let dispatcher = build_dispatcher(settings, Arc::new(provider)).unwrap();

	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	let (stop, stopped) = oneshot::channel::<()>();
	let task = tokio::spawn(HttpServer::new(dispatcher).serve(listener, async {
		let _ = stopped.await;
	}));
	Running {
		addr,
		stop,
		task,
		_theme: theme,
	}
}

async fn send(addr: SocketAddr, method: &str, path: &str) -> (StatusCode, http::HeaderMap, String) {
	let stream = TcpStream::connect(addr).await.unwrap();
	let (mut sender, conn) = http1::handshake(TokioIo::new(stream)).await.unwrap();
	tokio::spawn(conn);

	let request = hyper::Request::builder()
		.method(method)
		.uri(path)
		.header("host", "blog.test")
		.body(Empty::<Bytes>::new())
		.unwrap();
	let response = sender.send_request(request).await.unwrap();
	let status = response.status();
	let headers = response.headers().clone();
	let body = response.into_body().collect().await.unwrap().to_bytes();
	(status, headers, String::from_utf8(body.to_vec()).unwrap())
}

#[rstest]
#[tokio::test]
async fn test_serves_rendered_pages() {
	let server = start().await;

	let (status, headers, body) = send(server.addr, "GET", "/").await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, "Socket Blog:[Again][Hello]");
	assert_eq!(headers["content-type"], "text/html; charset=utf-8");
	assert!(headers.contains_key("etag"));
	assert!(headers.contains_key("last-modified"));

	let (status, _, body) = send(server.addr, "GET", "/post/hello").await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, "Hello in News");

	let (status, _, body) = send(server.addr, "GET", "/post/missing").await;
	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(body, "nothing here");

	server.stop.send(()).unwrap();
	server.task.await.unwrap().unwrap();
}

#[rstest]
#[tokio::test]
async fn test_method_handling() {
	let server = start().await;

	let (status, headers, body) = send(server.addr, "HEAD", "/").await;
	assert_eq!(status, StatusCode::OK);
	assert!(headers.contains_key("etag"));
	assert!(body.is_empty());

	let (status, headers, _) = send(server.addr, "POST", "/").await;
	assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
	assert_eq!(headers["allow"], "GET, HEAD");

	server.stop.send(()).unwrap();
	server.task.await.unwrap().unwrap();
}
