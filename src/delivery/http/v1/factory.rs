use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::delivery::contracts::ResourceUseCase;
use crate::delivery::http::v1::extract::{parse_id, Actor, ApiJson};
use crate::usecase::api_features::{Listing, QueryParams};
use crate::usecase::error::UsecaseError;

/// `{status: "success", data: {<key>: value}}`
pub fn envelope(key: &str, value: Value) -> Value {
    let mut data = Map::new();
    data.insert(key.to_string(), value);
    json!({ "status": "success", "data": data })
}

pub fn document_envelope(key: &str, document: impl Serialize) -> Result<Json<Value>, UsecaseError> {
    Ok(Json(envelope(key, serde_json::to_value(document)?)))
}

/// Applies the listing's projection and adds the `results` count.
pub fn list_envelope<T: Serialize>(key: &str, listing: Listing<T>) -> Result<Json<Value>, UsecaseError> {
    let documents = listing.into_documents()?;
    let results = documents.len();

    let mut body = envelope(key, Value::Array(documents));
    body["results"] = json!(results);
    Ok(Json(body))
}

/// Report rows under `key`, with a `results` count.
pub fn counted_envelope<T: Serialize>(key: &str, rows: Vec<T>) -> Result<Json<Value>, UsecaseError> {
    let results = rows.len();

    let mut body = envelope(key, serde_json::to_value(rows)?);
    body["results"] = json!(results);
    Ok(Json(body))
}

/// CRUD routes for one collection: `GET|POST {base}` and
/// `GET|PATCH|DELETE {base}/{id}`.
pub fn resource_router<U, S>(base: &str, usecase: Arc<U>) -> Router<S>
where
    U: ResourceUseCase,
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route(base, get(get_all::<U>).post(create_one::<U>))
        .route(
            &format!("{base}/{{id}}"),
            get(get_one::<U>).patch(update_one::<U>).delete(delete_one::<U>),
        )
        .with_state(usecase)
}

#[tracing::instrument(skip(usecase, params), fields(collection = U::PLURAL))]
async fn get_all<U: ResourceUseCase>(
    State(usecase): State<Arc<U>>,
    Query(params): Query<QueryParams>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling list request");

    let listing = usecase.list(params).await?;
    Ok((StatusCode::OK, list_envelope(U::PLURAL, listing)?))
}

#[tracing::instrument(skip(usecase), fields(collection = U::PLURAL))]
async fn get_one<U: ResourceUseCase>(
    State(usecase): State<Arc<U>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, UsecaseError> {
    let id = parse_id(&id)?;
    let document = usecase.get(id).await?;

    Ok((StatusCode::OK, document_envelope(U::SINGULAR, document)?))
}

#[tracing::instrument(skip(usecase, input), fields(collection = U::PLURAL))]
async fn create_one<U: ResourceUseCase>(
    State(usecase): State<Arc<U>>,
    Actor(actor): Actor,
    ApiJson(input): ApiJson<U::Create>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling create request");

    let document = usecase.create(input, actor).await?;
    Ok((StatusCode::CREATED, document_envelope(U::SINGULAR, document)?))
}

#[tracing::instrument(skip(usecase, input), fields(collection = U::PLURAL))]
async fn update_one<U: ResourceUseCase>(
    State(usecase): State<Arc<U>>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<U::Update>,
) -> Result<impl IntoResponse, UsecaseError> {
    let id = parse_id(&id)?;
    let document = usecase.update(id, input).await?;

    Ok((StatusCode::OK, document_envelope(U::SINGULAR, document)?))
}

#[tracing::instrument(skip(usecase), fields(collection = U::PLURAL))]
async fn delete_one<U: ResourceUseCase>(
    State(usecase): State<Arc<U>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, UsecaseError> {
    let id = parse_id(&id)?;
    usecase.delete(id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::{body::Body, extract::Request, response::Response};
    use http_body_util::BodyExt;
    use serde::Deserialize;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::usecase::api_features::Projection;

    #[derive(Debug, Clone, Serialize)]
    struct Note {
        id: Uuid,
        text: String,
        stars: i32,
    }

    #[derive(Deserialize)]
    struct NoteInput {
        text: String,
    }

    #[derive(Default)]
    struct Notes {
        items: Mutex<Vec<Note>>,
    }

    impl Notes {
        fn seeded(texts: &[&str]) -> Self {
            let items = texts
                .iter()
                .map(|t| Note {
                    id: Uuid::new_v4(),
                    text: t.to_string(),
                    stars: 5,
                })
                .collect();
            Self {
                items: Mutex::new(items),
            }
        }

        fn first_id(&self) -> Uuid {
            self.items.lock().unwrap()[0].id
        }
    }

    impl ResourceUseCase for Notes {
        type Document = Note;
        type Create = NoteInput;
        type Update = NoteInput;

        const SINGULAR: &'static str = "note";
        const PLURAL: &'static str = "notes";

        async fn list(&self, params: QueryParams) -> Result<Listing<Note>, UsecaseError> {
            let projection = match params.get("fields") {
                Some(_) => Projection::Include(vec!["text".to_string()]),
                None => Projection::All,
            };
            Ok(Listing::new(self.items.lock().unwrap().clone(), projection))
        }

        async fn get(&self, id: Uuid) -> Result<Note, UsecaseError> {
            self.items
                .lock()
                .unwrap()
                .iter()
                .find(|n| n.id == id)
                .cloned()
                .ok_or_else(|| UsecaseError::no_document(id))
        }

        async fn create(&self, input: NoteInput, _actor: Option<Uuid>) -> Result<Note, UsecaseError> {
            let note = Note {
                id: Uuid::new_v4(),
                text: input.text,
                stars: 0,
            };
            self.items.lock().unwrap().push(note.clone());
            Ok(note)
        }

        async fn update(&self, id: Uuid, input: NoteInput) -> Result<Note, UsecaseError> {
            let mut items = self.items.lock().unwrap();
            let note = items
                .iter_mut()
                .find(|n| n.id == id)
                .ok_or_else(|| UsecaseError::no_document(id))?;
            note.text = input.text;
            Ok(note.clone())
        }

        async fn delete(&self, id: Uuid) -> Result<(), UsecaseError> {
            let mut items = self.items.lock().unwrap();
            let before = items.len();
            items.retain(|n| n.id != id);
            if items.len() == before {
                return Err(UsecaseError::no_document(id));
            }
            Ok(())
        }
    }

    fn app(notes: Arc<Notes>) -> Router {
        resource_router("/api/v1/notes", notes)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_counted_envelope() {
        let Json(body) = counted_envelope("plan", vec![json!({ "month": 7 }), json!({ "month": 3 })]).unwrap();

        assert_eq!(body["status"], "success");
        assert_eq!(body["results"], 2);
        assert_eq!(body["data"]["plan"][0]["month"], 7);

        let Json(empty) = counted_envelope::<Value>("plan", vec![]).unwrap();
        assert_eq!(empty["results"], 0);
        assert_eq!(empty["data"]["plan"], json!([]));
    }

    #[tokio::test]
    async fn test_get_all_envelope() {
        let notes = Arc::new(Notes::seeded(&["first", "second"]));

        let response = app(notes)
            .oneshot(Request::get("/api/v1/notes").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["results"], 2);
        assert_eq!(body["data"]["notes"][1]["text"], "second");
    }

    #[tokio::test]
    async fn test_get_all_applies_projection() {
        let notes = Arc::new(Notes::seeded(&["first"]));

        let response = app(notes)
            .oneshot(Request::get("/api/v1/notes?fields=text").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = body_json(response).await;
        let note = &body["data"]["notes"][0];
        assert_eq!(note["text"], "first");
        assert!(note.get("id").is_some());
        assert!(note.get("stars").is_none());
    }

    #[tokio::test]
    async fn test_create_returns_201() {
        let notes = Arc::new(Notes::default());

        let response = app(notes.clone())
            .oneshot(
                Request::post("/api/v1/notes")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"text":"hello"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["data"]["note"]["text"], "hello");
        assert_eq!(notes.items.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_get_one() {
        let notes = Arc::new(Notes::seeded(&["draft"]));
        let id = notes.first_id();

        let response = app(notes.clone())
            .oneshot(
                Request::patch(format!("/api/v1/notes/{id}"))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"text":"final"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app(notes)
            .oneshot(Request::get(format!("/api/v1/notes/{id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["data"]["note"]["text"], "final");
    }

    #[tokio::test]
    async fn test_delete_returns_204_with_empty_body() {
        let notes = Arc::new(Notes::seeded(&["gone"]));
        let id = notes.first_id();

        let response = app(notes.clone())
            .oneshot(Request::delete(format!("/api/v1/notes/{id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
        assert!(notes.items.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_document_is_404() {
        let id = Uuid::new_v4();

        let response = app(Arc::new(Notes::default()))
            .oneshot(Request::get(format!("/api/v1/notes/{id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["status"], "fail");
        assert_eq!(body["message"], format!("No document found with that ID: {id}"));
    }

    #[tokio::test]
    async fn test_malformed_id_is_400() {
        let response = app(Arc::new(Notes::default()))
            .oneshot(Request::delete("/api/v1/notes/not-an-id").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Invalid id: not-an-id");
    }
}
