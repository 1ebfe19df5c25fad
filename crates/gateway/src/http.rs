use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use learn_core::model::{
    AnswerSubmission, AttemptId, AttemptOutcome, Course, CourseId, LessonId, ProgressSnapshot,
    Quiz, QuizId,
};

use crate::context::LearnerContext;
use crate::contract::{ProgressGateway, QuizGateway};
use crate::error::GatewayError;
use crate::records::{AttemptTicket, Eligibility, LessonCompletion};

const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug)]
pub struct HttpConfig {
    pub base_url: String,
    /// Fallback bearer token when the learner context carries none.
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl HttpConfig {
    /// Read `LEARN_API_BASE_URL`, `LEARN_API_TOKEN` and `LEARN_API_TIMEOUT_SECS`.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url =
            env::var("LEARN_API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let token = env::var("LEARN_API_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());
        let timeout = env::var("LEARN_API_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self {
            base_url,
            token,
            timeout: Duration::from_secs(timeout),
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Gateway backed by the learning platform's REST API.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: HttpConfig,
}

impl HttpBackend {
    /// # Errors
    ///
    /// Returns `GatewayError::Unavailable` if the HTTP client cannot be built.
    pub fn new(config: HttpConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    fn authorize(&self, request: RequestBuilder, learner: &LearnerContext) -> RequestBuilder {
        match learner.access_token().or(self.config.token.as_deref()) {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        learner: &LearnerContext,
        path: &str,
    ) -> Result<T, GatewayError> {
        let url = self.config.url(path);
        debug!(%url, "GET");
        let request = self.authorize(self.client.get(url), learner);
        decode(send(request).await?).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        learner: &LearnerContext,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        let url = self.config.url(path);
        debug!(%url, "POST");
        let request = self.authorize(self.client.post(url).json(body), learner);
        decode(send(request).await?).await
    }

    async fn post_empty(&self, learner: &LearnerContext, path: &str) -> Result<(), GatewayError> {
        let url = self.config.url(path);
        debug!(%url, "POST");
        let request = self.authorize(self.client.post(url), learner);
        send(request).await.map(|_| ())
    }
}

/// Send and turn non-success statuses into `GatewayError`.
async fn send(request: RequestBuilder) -> Result<Response, GatewayError> {
    let response = request.send().await.map_err(transport_error)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let err = classify(status, &body);
    warn!(%status, %err, "request failed");
    Err(err)
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
    response.json().await.map_err(transport_error)
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_decode() {
        GatewayError::Serialization(err.to_string())
    } else {
        GatewayError::Unavailable(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Map an unsuccessful status and its body to the error taxonomy.
#[must_use]
pub fn classify(status: StatusCode, body: &str) -> GatewayError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        });

    match status {
        StatusCode::UNAUTHORIZED => GatewayError::SessionExpired,
        StatusCode::FORBIDDEN => GatewayError::Forbidden(message),
        StatusCode::NOT_FOUND => GatewayError::NotFound,
        s if s.is_server_error() => GatewayError::Unavailable(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            GatewayError::Unavailable(message)
        }
        _ => GatewayError::Rejected(message),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompleteLessonRequest<'a> {
    completed_blocks: &'a [u32],
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    answers: &'a [AnswerSubmission],
}

#[async_trait]
impl ProgressGateway for HttpBackend {
    async fn get_course(
        &self,
        learner: &LearnerContext,
        course_id: CourseId,
    ) -> Result<Course, GatewayError> {
        let course: Course = self.get(learner, &format!("courses/{course_id}")).await?;
        course.validate().map_err(learn_core::Error::from)?;
        Ok(course)
    }

    async fn get_course_progress(
        &self,
        learner: &LearnerContext,
        course_id: CourseId,
    ) -> Result<Option<ProgressSnapshot>, GatewayError> {
        match self
            .get(learner, &format!("courses/{course_id}/progress"))
            .await
        {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(GatewayError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn enroll(
        &self,
        learner: &LearnerContext,
        course_id: CourseId,
    ) -> Result<ProgressSnapshot, GatewayError> {
        self.post(learner, &format!("courses/{course_id}/enroll"), &())
            .await
    }

    async fn complete_lesson(
        &self,
        learner: &LearnerContext,
        lesson_id: LessonId,
        completed_blocks: &[u32],
    ) -> Result<LessonCompletion, GatewayError> {
        self.post(
            learner,
            &format!("lessons/{lesson_id}/complete"),
            &CompleteLessonRequest { completed_blocks },
        )
        .await
    }
}

#[async_trait]
impl QuizGateway for HttpBackend {
    async fn can_start_attempt(
        &self,
        learner: &LearnerContext,
        quiz_id: QuizId,
    ) -> Result<Eligibility, GatewayError> {
        self.get(learner, &format!("quizzes/{quiz_id}/can-start"))
            .await
    }

    async fn get_quiz_for_learner(
        &self,
        learner: &LearnerContext,
        quiz_id: QuizId,
    ) -> Result<Quiz, GatewayError> {
        let quiz: Quiz = self.get(learner, &format!("quizzes/{quiz_id}/learner")).await?;
        quiz.validate().map_err(learn_core::Error::from)?;
        Ok(quiz)
    }

    async fn start_attempt(
        &self,
        learner: &LearnerContext,
        quiz_id: QuizId,
    ) -> Result<AttemptTicket, GatewayError> {
        self.post(learner, &format!("quizzes/{quiz_id}/attempts"), &())
            .await
    }

    async fn submit_attempt(
        &self,
        learner: &LearnerContext,
        attempt_id: AttemptId,
        answers: &[AnswerSubmission],
    ) -> Result<AttemptOutcome, GatewayError> {
        self.post(
            learner,
            &format!("attempts/{attempt_id}/submit"),
            &SubmitRequest { answers },
        )
        .await
    }

    async fn abandon_attempt(
        &self,
        learner: &LearnerContext,
        attempt_id: AttemptId,
    ) -> Result<(), GatewayError> {
        self.post_empty(learner, &format!("attempts/{attempt_id}/abandon"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_maps_statuses() {
        assert_eq!(
            classify(StatusCode::UNAUTHORIZED, ""),
            GatewayError::SessionExpired
        );
        assert_eq!(classify(StatusCode::NOT_FOUND, "{}"), GatewayError::NotFound);
        assert_eq!(
            classify(StatusCode::FORBIDDEN, r#"{"message":"premium only"}"#),
            GatewayError::Forbidden("premium only".into())
        );
        assert!(classify(StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(classify(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert_eq!(
            classify(StatusCode::CONFLICT, r#"{"message":"attempt already finished"}"#),
            GatewayError::Rejected("attempt already finished".into())
        );
    }

    #[test]
    fn classify_falls_back_to_reason_phrase() {
        assert_eq!(
            classify(StatusCode::UNPROCESSABLE_ENTITY, "<html>oops</html>"),
            GatewayError::Rejected("Unprocessable Entity".into())
        );
    }

    #[test]
    fn url_joins_without_double_slashes() {
        let config = HttpConfig {
            base_url: "https://learn.example.com/api/".into(),
            ..HttpConfig::default()
        };
        assert_eq!(
            config.url("/quizzes/4/can-start"),
            "https://learn.example.com/api/quizzes/4/can-start"
        );
    }

    #[test]
    fn client_builds_from_default_config() {
        let backend = HttpBackend::new(HttpConfig::default()).unwrap();
        assert_eq!(backend.config().timeout, Duration::from_secs(10));
    }
}
