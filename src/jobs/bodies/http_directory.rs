use futures::{StreamExt, TryStreamExt, stream};
use serde::Deserialize;

use crate::jobs::error::{JobError, JobResult};
use crate::jobs::registry::{GroupStream, JobBody};
use crate::jobs::types::{ExternalGroup, JobContext};

/// One page of a group directory response.
#[derive(Debug, Deserialize)]
struct DirectoryPage {
    groups: Vec<ExternalGroup>,
    #[serde(default)]
    next: Option<String>,
}

/// Pulls groups from an HTTP directory that pages with a `next` url.
///
/// The first request is `GET {url}?entity_id={id}`; each page is only fetched
/// once the previous one has been consumed.
#[derive(Debug, Clone)]
pub struct HttpDirectoryBody {
    client: reqwest::Client,
    url: String,
}

impl HttpDirectoryBody {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    fn first_page_url(&self, entity_id: i64) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}entity_id={}", self.url, separator, entity_id)
    }
}

async fn next_page(
    client: reqwest::Client,
    url: Option<String>,
) -> JobResult<Option<(Vec<ExternalGroup>, Option<String>)>> {
    let Some(url) = url else {
        return Ok(None);
    };

    tracing::debug!(url = %url, "Fetching group directory page");
    let page: DirectoryPage = client
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(Some((page.groups, page.next)))
}

impl JobBody for HttpDirectoryBody {
    fn name(&self) -> &'static str {
        "http_directory"
    }

    fn run(&self, ctx: JobContext) -> GroupStream {
        let client = self.client.clone();
        let first = self.first_page_url(ctx.entity.id);

        stream::try_unfold(Some(first), move |url| next_page(client.clone(), url))
            .map_ok(|groups| stream::iter(groups.into_iter().map(Ok::<_, JobError>)))
            .try_flatten()
            .boxed()
    }
}
