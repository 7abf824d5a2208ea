use std::path::Path;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::models::lenient;
use crate::models::{
    Donation, Donor, DonorGamification, DonorStats, FundStats, Ngo, NgoGamification, NgoProject,
    School, SchoolProject, Student,
};

/// A file to send as one part of a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self { file_name, bytes })
    }
}

/// Query for `/school-projects/filter`. Empty values and `"all"` are dropped.
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub search: Option<String>,
    pub project_type: Option<String>,
    pub funding: Option<String>,
}

impl ProjectFilter {
    fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::new();
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("search", search));
        }
        for (key, value) in [("type", &self.project_type), ("funding", &self.funding)] {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty() && *v != "all") {
                pairs.push((key, v));
            }
        }
        pairs
    }
}

/// Typed access to the BrightAid REST backend.
///
/// Every method returns the backend's answer or an [`Error`]; deciding
/// whether a failure should degrade to a default is left to the caller.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        // Validate up front so a bad base URL fails here, not on first use.
        Url::parse(&config.base_url)?;

        Ok(Self {
            client: Client::builder()
                .timeout(config.timeout)
                .default_headers(headers)
                .build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(&format!(
            "{}/{}",
            self.base_url,
            path.trim_start_matches('/')
        ))?)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status { status, body });
        }
        Ok(response)
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!(%url, "GET");
        let response = self.send(self.client.get(url)).await?;
        Self::read_json(response).await
    }

    pub(crate) async fn get_json_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let mut url = self.endpoint(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        debug!(%url, "GET");
        let response = self.send(self.client.get(url)).await?;
        Self::read_json(response).await
    }

    /// A JSON array endpoint. Anything other than an array is an empty list.
    pub(crate) async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let value: Value = self.get_json(path).await?;
        Self::list_from(path, value)
    }

    fn list_from<T: DeserializeOwned>(path: &str, value: Value) -> Result<Vec<T>> {
        match value {
            Value::Array(_) => Ok(serde_json::from_value(value)?),
            other => {
                debug!(path, kind = json_kind(&other), "expected a JSON array");
                Ok(Vec::new())
            }
        }
    }

    pub(crate) async fn get_number(&self, path: &str) -> Result<f64> {
        let value: Value = self.get_json(path).await?;
        lenient::value_as_f64(&value)
            .ok_or_else(|| Error::Validation(format!("{path} did not return a number")))
    }

    pub(crate) async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");
        let response = self.send(self.client.post(url).json(body)).await?;
        Self::read_json(response).await
    }

    pub(crate) async fn post_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let mut url = self.endpoint(path)?;
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        debug!(%url, "POST");
        let response = self.send(self.client.post(url)).await?;
        Self::read_json(response).await
    }

    pub(crate) async fn put_query(&self, path: &str, query: &[(&str, String)]) -> Result<()> {
        let mut url = self.endpoint(path)?;
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        debug!(%url, "PUT");
        self.send(self.client.put(url)).await?;
        Ok(())
    }

    pub(crate) async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
    ) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!(%url, "POST multipart");
        let response = self.send(self.client.post(url).multipart(form)).await?;
        Self::read_json(response).await
    }

    // Donors and donations

    pub async fn donor_by_user(&self, user_id: &str) -> Result<Donor> {
        self.get_json(&format!("donors/user/{user_id}")).await
    }

    pub async fn donations_by_donor(&self, donor_id: i64) -> Result<Vec<Donation>> {
        self.get_list(&format!("donations/donor/{donor_id}")).await
    }

    pub async fn all_donations(&self) -> Result<Vec<Donation>> {
        self.get_list("donations").await
    }

    pub async fn donations_by_school(&self, school_id: i64) -> Result<Vec<Donation>> {
        self.get_list(&format!("donations/school/{school_id}")).await
    }

    pub async fn create_donation<B: Serialize + ?Sized>(&self, donation: &B) -> Result<Donation> {
        self.post_json("donations", donation).await
    }

    pub async fn donor_gamification(&self, donor_id: i64) -> Result<DonorGamification> {
        self.get_json(&format!("donor-gamifications/donor/{donor_id}"))
            .await
    }

    pub async fn unique_schools_count(&self, donor_id: i64) -> Result<i64> {
        let count = self
            .get_number(&format!("donor-gamifications/donor/{donor_id}/unique-schools"))
            .await?;
        Ok(count as i64)
    }

    pub async fn donor_stats(&self, donor_id: i64) -> Result<DonorStats> {
        self.get_json(&format!("donor-gamifications/donor/{donor_id}/stats"))
            .await
    }

    // Schools, students and school projects

    pub async fn schools(&self) -> Result<Vec<School>> {
        self.get_list("schools").await
    }

    pub async fn school(&self, school_id: i64) -> Result<School> {
        self.get_json(&format!("schools/{school_id}")).await
    }

    pub async fn school_total_funds(&self, school_id: i64) -> Result<f64> {
        self.get_number(&format!("schools/{school_id}/total-funds-received"))
            .await
    }

    pub async fn school_fund_stats(&self, school_id: i64) -> Result<FundStats> {
        self.get_json(&format!("school-projects/school/{school_id}/fund-stats"))
            .await
    }

    pub async fn students(&self) -> Result<Vec<Student>> {
        self.get_list("students").await
    }

    pub async fn student(&self, student_id: i64) -> Result<Student> {
        self.get_json(&format!("students/{student_id}")).await
    }

    pub async fn sponsored_students(&self, donor_id: i64) -> Result<Vec<Student>> {
        self.get_list(&format!("students/sponsored/donor/{donor_id}"))
            .await
    }

    pub async fn high_risk_students(&self) -> Result<Vec<Student>> {
        self.get_list("students/high-risk-for-sponsorship").await
    }

    pub async fn school_projects(&self) -> Result<Vec<SchoolProject>> {
        self.get_list("school-projects").await
    }

    pub async fn filter_school_projects(&self, filter: &ProjectFilter) -> Result<Vec<SchoolProject>> {
        let value: Value = self
            .get_json_query("school-projects/filter", &filter.query_pairs())
            .await?;
        Self::list_from("school-projects/filter", value)
    }

    pub async fn project_type_names(&self) -> Result<Vec<String>> {
        self.get_list("school-projects/type-names").await
    }

    // NGOs

    pub async fn ngo(&self, ngo_id: i64) -> Result<Ngo> {
        self.get_json(&format!("ngos/{ngo_id}")).await
    }

    pub async fn ngo_projects(&self) -> Result<Vec<NgoProject>> {
        self.get_list("ngo-projects").await
    }

    pub async fn ngo_student_donations(&self, ngo_id: i64) -> Result<Vec<Donation>> {
        self.get_list(&format!("ngo-student-donations/ngo/{ngo_id}"))
            .await
    }

    pub async fn ngo_project_donations(&self, ngo_id: i64) -> Result<Vec<Donation>> {
        self.get_list(&format!("ngo-project-donations/ngo/{ngo_id}"))
            .await
    }

    pub async fn ngo_gamification(&self, ngo_id: i64) -> Result<NgoGamification> {
        self.get_json(&format!("ngo-gamification/ngo/{ngo_id}")).await
    }

    // Uploads

    /// Uploads images for a project update or expense receipt and returns
    /// the stored image URLs.
    pub async fn upload_project_images(
        &self,
        project_id: i64,
        images: Vec<UploadFile>,
    ) -> Result<Vec<String>> {
        let form = image_form(images).text("projectId", project_id.to_string());
        let response: Value = self.post_multipart("upload/project-images", form).await?;
        Ok(image_urls(&response))
    }

    /// `kind` is `"before"` or `"after"`.
    pub async fn upload_transparency_images(
        &self,
        project_id: i64,
        kind: &str,
        images: Vec<UploadFile>,
    ) -> Result<Vec<String>> {
        let form = image_form(images)
            .text("type", kind.to_string())
            .text("projectId", project_id.to_string());
        let response: Value = self
            .post_multipart("upload/transparency-images", form)
            .await?;
        Ok(image_urls(&response))
    }
}

fn image_form(images: Vec<UploadFile>) -> Form {
    images.into_iter().fold(Form::new(), |form, image| {
        form.part("images", Part::bytes(image.bytes).file_name(image.file_name))
    })
}

fn image_urls(response: &Value) -> Vec<String> {
    response["imageUrls"]
        .as_array()
        .map(|urls| {
            urls.iter()
                .filter_map(|u| u.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
