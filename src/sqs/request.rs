//! SQS request parsing from form-encoded query strings and POST bodies.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::sqs::types::SqsAction;

/// Parsed SQS request.
#[derive(Debug, Clone)]
pub struct SqsRequest {
    /// The SQS action.
    pub action: SqsAction,
    /// Queue name taken from the request path, when the action arrived on
    /// `/<queue_name>` rather than `/`.
    pub queue_name: Option<String>,
    /// Request parameters, merged from the query string and the body.
    pub params: HashMap<String, String>,
}

impl SqsRequest {
    /// Parse a request from its query string and form-encoded body.
    /// Body parameters win over query parameters on conflict.
    pub fn parse(query: &str, body: &str, queue_name: Option<String>) -> Result<Self> {
        let mut params = parse_form_data(query);
        params.extend(parse_form_data(body));

        let action = params
            .get("Action")
            .ok_or_else(|| Error::MissingParameter("Action".to_string()))?
            .parse::<SqsAction>()?;

        Ok(Self {
            action,
            queue_name,
            params,
        })
    }

    /// Get a parameter value.
    pub fn get_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|s| s.as_str())
    }

    /// Get a required parameter.
    pub fn get_required_param(&self, key: &str) -> Result<&str> {
        self.get_param(key)
            .ok_or_else(|| Error::MissingParameter(key.to_string()))
    }

    /// Parse CreateQueue attributes from the request.
    ///
    /// Encoded as `Attribute.1.Name=VisibilityTimeout`,
    /// `Attribute.1.Value=30`, `Attribute.2.Name=...` and so on.
    pub fn parse_queue_attributes(&self) -> HashMap<String, String> {
        let mut attributes = HashMap::new();

        let mut index = 1;
        loop {
            let name_key = format!("Attribute.{}.Name", index);
            let value_key = format!("Attribute.{}.Value", index);

            if let (Some(name), Some(value)) =
                (self.get_param(&name_key), self.get_param(&value_key))
            {
                attributes.insert(name.to_string(), value.to_string());
                index += 1;
            } else {
                break;
            }
        }

        attributes
    }

    /// Parse attribute names (`AttributeName.N`) for ReceiveMessage and
    /// GetQueueAttributes.
    pub fn parse_attribute_names(&self) -> Vec<String> {
        let mut names = Vec::new();

        let mut index = 1;
        loop {
            let key = format!("AttributeName.{}", index);
            if let Some(name) = self.get_param(&key) {
                names.push(name.to_string());
                index += 1;
            } else {
                break;
            }
        }

        names
    }
}

/// Parse form-encoded data into a map.
fn parse_form_data(data: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    for pair in data.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            // '+' means space in application/x-www-form-urlencoded
            let value_with_spaces = value.replace('+', " ");
            let decoded_key = urlencoding::decode(key).unwrap_or_default();
            let decoded_value = urlencoding::decode(&value_with_spaces).unwrap_or_default();
            params.insert(decoded_key.to_string(), decoded_value.to_string());
        }
    }

    params
}

/// Extract the queue name from a queue URL (`<base_url>/<queue_name>`).
pub fn extract_queue_name_from_url(queue_url: &str) -> Option<String> {
    queue_url
        .split('/')
        .next_back()
        .filter(|segment| !segment.is_empty())
        .map(String::from)
}
