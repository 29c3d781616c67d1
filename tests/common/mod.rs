#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use arrow::record_batch::RecordBatch;
use axum::body::Bytes;
use axum::extract::Multipart;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use axum::Router;
use serde_json::{json, Value};

use ray_serve_adapter::codec::from_records;
use ray_serve_adapter::{ArgMap, MemoryStorage, RayServeHandler};

/// One request as seen by the fake endpoint.
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    pub content_type: Option<String>,
    /// Raw body for non-multipart requests
    pub body: Bytes,
    /// Multipart fields by name, with their file name if any
    pub fields: HashMap<String, (Option<String>, Bytes)>,
}

impl Recorded {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn field_text(&self, name: &str) -> String {
        String::from_utf8(self.fields[name].1.to_vec()).unwrap()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<Recorded>>>);

impl Recorder {
    pub fn push(&self, request: Recorded) {
        self.0.lock().unwrap().push(request);
    }

    pub fn all(&self) -> Vec<Recorded> {
        self.0.lock().unwrap().clone()
    }

    pub fn last(&self) -> Recorded {
        self.all().pop().expect("no request reached the fake endpoint")
    }

    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Records a plain request body.
pub async fn record_body(recorder: &Recorder, headers: &HeaderMap, body: Bytes) {
    recorder.push(Recorded {
        content_type: content_type(headers),
        body,
        fields: HashMap::new(),
    });
}

/// Records every field of a multipart request.
pub async fn record_multipart(recorder: &Recorder, headers: &HeaderMap, mut multipart: Multipart) -> Recorded {
    let mut fields = HashMap::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let data = field.bytes().await.unwrap();
        fields.insert(name, (file_name, data));
    }
    let recorded = Recorded {
        content_type: content_type(headers),
        body: Bytes::new(),
        fields,
    };
    recorder.push(recorded.clone());
    recorded
}

/// Serves `router` on an ephemeral local port from a background runtime and returns its base URL.
pub fn spawn(router: Router) -> String {
    let (tx, rx) = std::sync::mpsc::channel::<SocketAddr>();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, router).await.unwrap();
        });
    });
    format!("http://{}", rx.recv().unwrap())
}

pub fn handler() -> RayServeHandler<MemoryStorage> {
    RayServeHandler::new(MemoryStorage::new()).unwrap()
}

pub fn map(value: Value) -> ArgMap {
    value.as_object().cloned().unwrap()
}

pub fn using(base_url: &str, extra: Value) -> ArgMap {
    let mut using = map(json!({
        "train_url": format!("{base_url}/train"),
        "predict_url": format!("{base_url}/predict"),
    }));
    using.extend(map(extra));
    map(json!({ "using": using }))
}

pub fn rentals() -> RecordBatch {
    from_records(&[
        json!({"sqft": 917, "location": "great", "neighborhood": "berkeley_hills", "rental_price": 3901}),
        json!({"sqft": 194, "location": "good", "neighborhood": "westbrae", "rental_price": 2042}),
        json!({"sqft": 543, "location": null, "neighborhood": "downtown", "rental_price": 1871}),
    ])
    .unwrap()
}
