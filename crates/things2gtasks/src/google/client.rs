use reqwest::header::RETRY_AFTER;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use things2gtasks_core::destination::{DestTask, Destination, NewTask, TaskList};
use things2gtasks_core::error::DestinationError;
use things2gtasks_core::google::{
    classify_error, insert_query, task_body, transform_task, transform_task_list,
    transform_tasks, GooglePage, GoogleTask, GoogleTaskList, MAX_PAGE_SIZE, TASKS_API_BASE,
};
use things2gtasks_core::retry::{parse_retry_after, RetryPolicy};

/// Google Tasks REST client.
///
/// Every request is retried on rate limits and transient failures according
/// to its [`RetryPolicy`].
pub struct GoogleTasksClient {
    http: reqwest::Client,
    access_token: String,
    base_url: String,
    retry: RetryPolicy,
    default_list_id: Option<String>,
}

impl GoogleTasksClient {
    pub fn new(http: reqwest::Client, access_token: String) -> Self {
        Self {
            http,
            access_token,
            base_url: TASKS_API_BASE.to_string(),
            retry: RetryPolicy::default(),
            default_list_id: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Send a request built by `build`, retrying retryable failures.
    async fn send(
        &self,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<Response, DestinationError> {
        let mut attempt = 1;
        loop {
            let (error, retry_after) = match build().bearer_auth(&self.access_token).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status().as_u16();
                    let retry_after = response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(parse_retry_after);
                    let body = response.text().await.unwrap_or_default();
                    (classify_error(status, &body), retry_after)
                }
                Err(err) => (DestinationError::Transient(format!("network error: {err}")), None),
            };

            if !error.is_retryable() || !self.retry.should_retry(attempt) {
                return Err(error);
            }

            let Some(delay) = self.retry.delay_for(attempt, retry_after) else {
                log::warn!(
                    "Server asked to wait {:?}, longer than the {:?} limit: {}",
                    retry_after.unwrap_or_default(),
                    self.retry.max_delay,
                    error
                );
                return Err(error);
            };

            log::warn!(
                "Request failed (attempt {}/{}): {}. Retrying in {:?}",
                attempt,
                self.retry.max_attempts,
                error,
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<T, DestinationError> {
        let response = self
            .send(|| {
                let builder = self.http.request(method.clone(), url).query(query);
                match body {
                    Some(body) => builder.json(body),
                    None => builder,
                }
            })
            .await?;

        response
            .json::<T>()
            .await
            .map_err(|e| DestinationError::Fatal(format!("unexpected response from {url}: {e}")))
    }

    async fn delete(&self, url: &str) -> Result<(), DestinationError> {
        self.send(|| self.http.delete(url)).await.map(|_| ())
    }

    /// Follow `nextPageToken` until the collection is exhausted.
    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, DestinationError> {
        let url = self.url(path);
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = query.to_vec();
            params.push(("maxResults", MAX_PAGE_SIZE.to_string()));
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }

            let page: GooglePage<T> = self.request(Method::GET, &url, &params, None).await?;
            items.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(items),
            }
        }
    }

    async fn default_list_id(&mut self) -> Result<String, DestinationError> {
        if let Some(id) = &self.default_list_id {
            return Ok(id.clone());
        }
        let url = self.url("users/@me/lists/@default");
        let list: GoogleTaskList = self.request(Method::GET, &url, &[], None).await?;
        self.default_list_id = Some(list.id.clone());
        Ok(list.id)
    }
}

impl Destination for GoogleTasksClient {
    async fn list_lists(&mut self) -> Result<Vec<TaskList>, DestinationError> {
        let default_id = self.default_list_id().await?;
        let lists: Vec<GoogleTaskList> = self.get_all("users/@me/lists", &[]).await?;
        Ok(lists
            .into_iter()
            .map(|list| transform_task_list(list, Some(default_id.as_str())))
            .collect())
    }

    async fn create_list(&mut self, title: &str) -> Result<TaskList, DestinationError> {
        let url = self.url("users/@me/lists");
        let body = serde_json::json!({ "title": title });
        let list: GoogleTaskList = self.request(Method::POST, &url, &[], Some(&body)).await?;
        Ok(transform_task_list(list, None))
    }

    async fn delete_list(&mut self, list_id: &str) -> Result<(), DestinationError> {
        let url = self.url(&format!("users/@me/lists/{}", urlencoding::encode(list_id)));
        self.delete(&url).await
    }

    async fn create_task(&mut self, list_id: &str, task: &NewTask) -> Result<DestTask, DestinationError> {
        let url = self.url(&format!("lists/{}/tasks", urlencoding::encode(list_id)));
        let body = serde_json::to_value(task_body(task))
            .map_err(|e| DestinationError::Fatal(format!("cannot encode task: {e}")))?;
        let created: GoogleTask = self
            .request(Method::POST, &url, &insert_query(task), Some(&body))
            .await?;
        Ok(transform_task(created))
    }

    async fn delete_task(&mut self, list_id: &str, task_id: &str) -> Result<(), DestinationError> {
        let url = self.url(&format!(
            "lists/{}/tasks/{}",
            urlencoding::encode(list_id),
            urlencoding::encode(task_id)
        ));
        self.delete(&url).await
    }

    async fn list_tasks(&mut self, list_id: &str) -> Result<Vec<DestTask>, DestinationError> {
        let tasks: Vec<GoogleTask> = self
            .get_all(
                &format!("lists/{}/tasks", urlencoding::encode(list_id)),
                &[
                    ("showCompleted", "true".to_string()),
                    ("showHidden", "true".to_string()),
                ],
            )
            .await?;
        Ok(transform_tasks(tasks))
    }
}
