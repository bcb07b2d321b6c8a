use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure talking to the listing source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    pub area: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingSummary {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct ListingPage {
    pub items: Vec<PostingSummary>,
    /// Total page count declared by the source, if it sent one.
    pub pages: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salary {
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct PostingDetail {
    pub id: String,
    pub title: String,
    /// Raw HTML description.
    pub description: String,
    pub skills: BTreeSet<String>,
    pub salary: Option<Salary>,
    pub experience: Option<NamedRef>,
    pub schedule: Option<NamedRef>,
}

// ── Wire format ──

#[derive(Deserialize)]
struct ListingDto {
    #[serde(default)]
    items: Option<Vec<SummaryDto>>,
    #[serde(default)]
    pages: Option<u32>,
}

#[derive(Deserialize)]
struct SummaryDto {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

impl From<ListingDto> for ListingPage {
    fn from(dto: ListingDto) -> Self {
        ListingPage {
            items: dto
                .items
                .unwrap_or_default()
                .into_iter()
                .map(|s| PostingSummary {
                    id: s.id,
                    title: s.name.unwrap_or_default(),
                })
                .collect(),
            pages: dto.pages,
        }
    }
}

#[derive(Deserialize)]
pub struct VacancyDto {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    key_skills: Option<Vec<KeySkillDto>>,
    #[serde(default)]
    salary: Option<SalaryDto>,
    #[serde(default)]
    experience: Option<NamedRefDto>,
    #[serde(default)]
    schedule: Option<NamedRefDto>,
}

#[derive(Deserialize)]
struct KeySkillDto {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct SalaryDto {
    #[serde(default)]
    from: Option<i64>,
    #[serde(default)]
    to: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Deserialize)]
struct NamedRefDto {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl From<NamedRefDto> for NamedRef {
    fn from(dto: NamedRefDto) -> Self {
        NamedRef {
            id: dto.id.unwrap_or_default(),
            name: dto.name.unwrap_or_default(),
        }
    }
}

impl From<VacancyDto> for PostingDetail {
    fn from(dto: VacancyDto) -> Self {
        let skills = dto
            .key_skills
            .unwrap_or_default()
            .into_iter()
            .filter_map(|s| s.name)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        PostingDetail {
            id: dto.id,
            title: dto.name.unwrap_or_default(),
            description: dto.description.unwrap_or_default(),
            skills,
            salary: dto.salary.map(|s| Salary {
                from: s.from,
                to: s.to,
                currency: s.currency.unwrap_or_default(),
            }),
            experience: dto.experience.map(NamedRef::from),
            schedule: dto.schedule.map(NamedRef::from),
        }
    }
}

// ── Source ──

/// Anything that can serve listing pages and vacancy details.
#[allow(async_fn_in_trait)]
pub trait VacancySource {
    async fn search(
        &self,
        query: &SearchQuery,
        page: u32,
        per_page: u32,
    ) -> Result<ListingPage, SourceError>;

    async fn vacancy(&self, id: &str) -> Result<PostingDetail, SourceError>;
}

/// hh.ru public API client.
pub struct HhClient {
    client: reqwest::Client,
    base_url: String,
}

impl HhClient {
    pub fn new(base_url: &str, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(HhClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_text(&self, request: reqwest::RequestBuilder) -> Result<String, SourceError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }
        Ok(response.text().await?)
    }
}

impl VacancySource for HhClient {
    async fn search(
        &self,
        query: &SearchQuery,
        page: u32,
        per_page: u32,
    ) -> Result<ListingPage, SourceError> {
        let mut params = vec![
            ("text", query.text.clone()),
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
        ];
        if let Some(area) = query.area {
            params.push(("area", area.to_string()));
        }

        let url = format!("{}/vacancies", self.base_url);
        debug!("GET {} page={}", url, page);
        let body = self.get_text(self.client.get(&url).query(&params)).await?;
        let dto: ListingDto = serde_json::from_str(&body)?;
        Ok(dto.into())
    }

    async fn vacancy(&self, id: &str) -> Result<PostingDetail, SourceError> {
        let url = format!("{}/vacancies/{}", self.base_url, id);
        debug!("GET {}", url);
        let body = self.get_text(self.client.get(&url)).await?;
        let dto: VacancyDto = serde_json::from_str(&body)?;
        Ok(dto.into())
    }
}
