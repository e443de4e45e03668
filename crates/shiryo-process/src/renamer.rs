//! LLM-backed file renaming.
//!
//! Feeds extracted document text plus crawl context into a chat model and
//! recovers the canonical eight-field name from its JSON answer.

use std::sync::Arc;

use async_trait::async_trait;

use shiryo_core::domain::{sanitize_file_name, StructuredName, UNKNOWN_FIELD};
use shiryo_core::ports::{NamingRecord, RenameContext, RenameError, RenamerPort};
use shiryo_llm::{extract_json_object, ChatBackend, ChatError};

/// Prompt sent for every document. Placeholders are substituted verbatim.
pub const RENAME_PROMPT_TEMPLATE: &str = r#"あなたは日本の大学入試資料を整理するアーキビストです。
以下の資料に、規定の形式で標準化したファイル名を付けてください。

## 資料の情報
- 確定した学校名: {school_name}
- 取得元URL: {url}
- パンくずリスト: {breadcrumb}
- ページタイトル: {title}
- 親ページタイトル: {parent_title}
- 元のファイル名: {original_name}

## 資料の本文（冒頭）
{content}

## 出力形式
次のキーを持つJSONオブジェクトのみを出力してください。
- "renamed": {大学名}_{所属}_{専攻}_{課程}_{年度}_{入学時期}_{文書種別}_{詳細} の形式のファイル名
- "university": 大学名
- "department": 所属（研究科または学部）
- "major": 専攻
- "course": 課程（学部/修士/博士）
- "year": 年度（西暦）
- "semester": 入学時期（4月/10月/4月10月）
- "doc_type": 文書種別（募集要項/過去問/結果発表など）
- "detail": 詳細情報
- "confidence": 判定の確信度 (0.0〜1.0)
- "reason": 判定理由

不明な項目には "Unknown" を使ってください。値の中にアンダースコアを入れないでください。
"#;

/// Renamer over a chat backend.
pub struct LlmRenamer {
    backend: Arc<dyn ChatBackend>,
    template: String,
}

impl LlmRenamer {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            template: RENAME_PROMPT_TEMPLATE.to_string(),
        }
    }

    /// Replace the built-in prompt template.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    fn build_prompt(&self, content: &str, context: &RenameContext) -> String {
        let or_unknown = |value: &str| {
            if value.is_empty() {
                UNKNOWN_FIELD.to_string()
            } else {
                value.to_string()
            }
        };
        let capped: String = content.chars().take(8000).collect();
        self.template
            .replace("{school_name}", &or_unknown(context.school_name.as_deref().unwrap_or("")))
            .replace("{url}", &or_unknown(&context.url))
            .replace("{breadcrumb}", &or_unknown(&context.breadcrumb))
            .replace("{title}", &or_unknown(&context.title))
            .replace("{parent_title}", &or_unknown(&context.parent_title))
            .replace("{original_name}", &or_unknown(&context.original_name))
            .replace("{content}", &capped)
    }
}

fn string_field(value: &serde_json::Value, key: &str) -> String {
    value
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_FIELD)
        .to_string()
}

/// The authoritative school name, when the context carries a usable one.
fn confirmed_school(context: &RenameContext) -> Option<&str> {
    context
        .school_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != UNKNOWN_FIELD)
}

/// Replace the leading positional component of a name stem.
fn replace_leading_component(stem: &str, replacement: &str) -> String {
    match stem.split_once('_') {
        Some((_, rest)) => format!("{replacement}_{rest}"),
        None => replacement.to_string(),
    }
}

/// Force `name` to end in `.{extension}` exactly once.
fn force_extension(name: &str, extension: &str) -> String {
    let wanted = format!(".{extension}");
    if name.to_ascii_lowercase().ends_with(&wanted.to_ascii_lowercase()) {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, _)) => format!("{stem}{wanted}"),
        None => format!("{name}{wanted}"),
    }
}

#[async_trait]
impl RenamerPort for LlmRenamer {
    async fn rename(
        &self,
        text: &str,
        context: &RenameContext,
        extension: &str,
    ) -> Result<NamingRecord, RenameError> {
        let prompt = self.build_prompt(text, context);
        let raw = self.backend.complete(&prompt).await.map_err(|e| match e {
            ChatError::Malformed(message) => RenameError::MalformedResponse(message),
            other => RenameError::Api(other.to_string()),
        })?;

        let value = extract_json_object(&raw).ok_or_else(|| {
            RenameError::MalformedResponse(format!(
                "no JSON object in response: {}",
                raw.chars().take(120).collect::<String>()
            ))
        })?;

        let mut fields = StructuredName {
            university: string_field(&value, "university"),
            department: string_field(&value, "department"),
            major: string_field(&value, "major"),
            course: string_field(&value, "course"),
            year: string_field(&value, "year"),
            semester: string_field(&value, "semester"),
            doc_type: string_field(&value, "doc_type"),
            detail: string_field(&value, "detail"),
        };

        let mut name = value
            .get("renamed")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        if name.is_empty() {
            return Err(RenameError::EmptyName);
        }

        // The upstream catalog's school name is authoritative over
        // whatever the model read out of the document.
        if let Some(school) = confirmed_school(context) {
            fields.university = school.to_string();
            let (stem, ext) = name
                .rsplit_once('.')
                .map_or((name.as_str(), extension), |(s, e)| (s, e));
            name = format!("{}.{ext}", replace_leading_component(stem, school));
        }

        name = sanitize_file_name(&force_extension(&name, extension));
        if name.is_empty() {
            return Err(RenameError::EmptyName);
        }

        let confidence = value
            .get("confidence")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(0.5);

        tracing::debug!(name = %name, confidence, "renamed document");
        Ok(NamingRecord {
            name,
            fields,
            confidence,
            model: self.backend.model().to_string(),
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiryo_llm::CannedBackend;

    fn context() -> RenameContext {
        RenameContext {
            url: "https://www.s.u-tokyo.ac.jp/admission/master/yoko.pdf".to_string(),
            title: "修士課程募集要項".to_string(),
            breadcrumb: "入試情報 > 募集要項".to_string(),
            parent_title: "入試情報".to_string(),
            original_name: "yoko_2025.pdf".to_string(),
            school_name: None,
        }
    }

    fn renamer(responses: Vec<&str>) -> LlmRenamer {
        LlmRenamer::new(Arc::new(CannedBackend::new(responses)))
    }

    const GOOD_RESPONSE: &str = r#"判定結果は以下です。
{"renamed": "東京大学_理学系研究科_物理学専攻_修士_2025_4月_募集要項_一般選抜.pdf",
 "university": "東京大学", "department": "理学系研究科", "major": "物理学専攻",
 "course": "修士", "year": "2025", "semester": "4月",
 "doc_type": "募集要項", "detail": "一般選抜",
 "confidence": 0.92, "reason": "表紙に明記"}"#;

    #[tokio::test]
    async fn recovers_record_from_prose_wrapped_json() {
        let record = renamer(vec![GOOD_RESPONSE])
            .rename("令和7年度 募集要項", &context(), "pdf")
            .await
            .unwrap();
        assert_eq!(
            record.name,
            "東京大学_理学系研究科_物理学専攻_修士_2025_4月_募集要項_一般選抜.pdf"
        );
        assert_eq!(record.fields.university, "東京大学");
        assert_eq!(record.confidence, 0.92);
        assert_eq!(record.model, "canned-model");
        assert!(record.raw.contains("判定結果"));
    }

    #[tokio::test]
    async fn school_name_overrides_model_output() {
        let mut ctx = context();
        ctx.school_name = Some("京都大学".to_string());
        let record = renamer(vec![GOOD_RESPONSE])
            .rename("text", &ctx, "pdf")
            .await
            .unwrap();
        assert!(record.name.starts_with("京都大学_理学系研究科_"));
        assert_eq!(record.fields.university, "京都大学");
    }

    #[tokio::test]
    async fn unknown_school_name_does_not_override() {
        let mut ctx = context();
        ctx.school_name = Some(UNKNOWN_FIELD.to_string());
        let record = renamer(vec![GOOD_RESPONSE])
            .rename("text", &ctx, "pdf")
            .await
            .unwrap();
        assert!(record.name.starts_with("東京大学_"));
    }

    #[tokio::test]
    async fn extension_is_forced() {
        let response = r#"{"renamed": "東京大学_工学部_Unknown_学部_2025_4月_過去問_数学.txt",
                           "confidence": 0.7}"#;
        let record = renamer(vec![response])
            .rename("text", &context(), "docx")
            .await
            .unwrap();
        assert!(record.name.ends_with(".docx"));
        assert!(!record.name.contains(".txt"));
    }

    #[tokio::test]
    async fn missing_fields_become_unknown() {
        let response = r#"{"renamed": "東京大学_工学部_建築_学部_2025_4月_要項_追試.pdf"}"#;
        let record = renamer(vec![response])
            .rename("text", &context(), "pdf")
            .await
            .unwrap();
        assert_eq!(record.fields.major, "建築");
        assert_eq!(record.fields.semester, "4月");
        assert_eq!(record.fields.doc_type, "要項");
        assert_eq!(record.confidence, 0.5);
    }

    #[tokio::test]
    async fn empty_name_is_an_error() {
        let response = r#"{"renamed": "", "university": "東京大学"}"#;
        let result = renamer(vec![response]).rename("text", &context(), "pdf").await;
        assert!(matches!(result, Err(RenameError::EmptyName)));
    }

    #[tokio::test]
    async fn non_json_response_is_malformed() {
        let result = renamer(vec!["すみません、判定できませんでした。"])
            .rename("text", &context(), "pdf")
            .await;
        assert!(matches!(result, Err(RenameError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn backend_failure_is_an_api_error() {
        let result = LlmRenamer::new(Arc::new(CannedBackend::failing()))
            .rename("text", &context(), "pdf")
            .await;
        assert!(matches!(result, Err(RenameError::Api(_))));
    }

    #[test]
    fn prompt_carries_context_and_caps_content() {
        let renamer = renamer(vec![]);
        let long_content = "あ".repeat(10_000);
        let prompt = renamer.build_prompt(&long_content, &context());
        assert!(prompt.contains("yoko_2025.pdf"));
        assert!(prompt.contains("入試情報 > 募集要項"));
        // Missing school name renders as Unknown
        assert!(prompt.contains("確定した学校名: Unknown"));
        assert!(prompt.chars().filter(|c| *c == 'あ').count() <= 8000);
    }
}
