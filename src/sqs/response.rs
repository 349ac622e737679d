//! SQS XML response generation.

use uuid::Uuid;

use crate::error::Error;
use crate::types::{ReceivedMessage, SendReceipt};

/// XML response builder for flat single-result responses.
pub struct XmlResponseBuilder {
    action: String,
    request_id: String,
    elements: Vec<(String, String)>,
}

impl XmlResponseBuilder {
    /// Create a new response builder for a specific action.
    pub fn new(action: &str) -> Self {
        Self {
            action: action.to_string(),
            request_id: Uuid::new_v4().to_string(),
            elements: Vec::new(),
        }
    }

    /// Add a result element.
    pub fn add_element(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.elements.push((name.into(), value.into()));
        self
    }

    /// Build the XML document.
    pub fn build(self) -> String {
        let mut xml = String::new();
        xml.push_str(r#"<?xml version="1.0"?>"#);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<{}Response xmlns="http://queue.amazonaws.com/doc/2012-11-05/">"#,
            self.action
        ));
        xml.push('\n');
        xml.push_str(&format!("  <{}Result>\n", self.action));

        for (name, value) in &self.elements {
            xml.push_str(&format!("    <{}>{}</{}>\n", name, escape_xml(value), name));
        }

        xml.push_str(&format!("  </{}Result>\n", self.action));
        xml.push_str("  <ResponseMetadata>\n");
        xml.push_str(&format!("    <RequestId>{}</RequestId>\n", self.request_id));
        xml.push_str("  </ResponseMetadata>\n");
        xml.push_str(&format!("</{}Response>", self.action));

        xml
    }
}

/// Build an error response document.
pub fn build_error_response(error: &Error) -> String {
    format!(
        r#"<?xml version="1.0"?>
<ErrorResponse xmlns="http://queue.amazonaws.com/doc/2012-11-05/">
  <Error>
    <Type>Sender</Type>
    <Code>{}</Code>
    <Message>{}</Message>
  </Error>
  <RequestId>{}</RequestId>
</ErrorResponse>"#,
        error.code(),
        escape_xml(&error.to_string()),
        Uuid::new_v4()
    )
}

/// Build a response whose result element is empty (DeleteQueue,
/// DeleteMessage, ChangeMessageVisibility, PurgeQueue).
pub fn build_empty_response(action: &str) -> String {
    XmlResponseBuilder::new(action).build()
}

/// Build a CreateQueue response.
pub fn build_create_queue_response(queue_url: &str) -> String {
    XmlResponseBuilder::new("CreateQueue")
        .add_element("QueueUrl", queue_url)
        .build()
}

/// Build a GetQueueUrl response.
pub fn build_get_queue_url_response(queue_url: &str) -> String {
    XmlResponseBuilder::new("GetQueueUrl")
        .add_element("QueueUrl", queue_url)
        .build()
}

/// Build a ListQueues response.
pub fn build_list_queues_response(queue_urls: &[String]) -> String {
    let mut builder = XmlResponseBuilder::new("ListQueues");
    for url in queue_urls {
        builder = builder.add_element("QueueUrl", url);
    }
    builder.build()
}

/// Build a SendMessage response.
pub fn build_send_message_response(receipt: &SendReceipt) -> String {
    XmlResponseBuilder::new("SendMessage")
        .add_element("MessageId", &receipt.message_id.0)
        .add_element("MD5OfMessageBody", &receipt.body_md5)
        .build()
}

/// Build a ReceiveMessage response. An empty message list is a valid result.
pub fn build_receive_message_response(messages: &[ReceivedMessage]) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0"?>"#);
    xml.push('\n');
    xml.push_str(r#"<ReceiveMessageResponse xmlns="http://queue.amazonaws.com/doc/2012-11-05/">"#);
    xml.push('\n');
    xml.push_str("  <ReceiveMessageResult>\n");

    for message in messages {
        xml.push_str("    <Message>\n");
        xml.push_str(&format!(
            "      <MessageId>{}</MessageId>\n",
            escape_xml(&message.info.message_id.0)
        ));
        xml.push_str(&format!(
            "      <ReceiptHandle>{}</ReceiptHandle>\n",
            escape_xml(&message.receipt_handle)
        ));
        xml.push_str(&format!(
            "      <MD5OfBody>{}</MD5OfBody>\n",
            escape_xml(&message.info.body_md5)
        ));
        xml.push_str(&format!(
            "      <Body>{}</Body>\n",
            escape_xml(&message.info.body)
        ));
        for (name, value) in &message.attributes {
            xml.push_str("      <Attribute>\n");
            xml.push_str(&format!("        <Name>{}</Name>\n", escape_xml(name)));
            xml.push_str(&format!("        <Value>{}</Value>\n", escape_xml(value)));
            xml.push_str("      </Attribute>\n");
        }
        xml.push_str("    </Message>\n");
    }

    xml.push_str("  </ReceiveMessageResult>\n");
    xml.push_str("  <ResponseMetadata>\n");
    xml.push_str(&format!("    <RequestId>{}</RequestId>\n", Uuid::new_v4()));
    xml.push_str("  </ResponseMetadata>\n");
    xml.push_str("</ReceiveMessageResponse>");

    xml
}

/// Build a GetQueueAttributes response.
pub fn build_get_queue_attributes_response(attributes: &[(String, String)]) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0"?>"#);
    xml.push('\n');
    xml.push_str(
        r#"<GetQueueAttributesResponse xmlns="http://queue.amazonaws.com/doc/2012-11-05/">"#,
    );
    xml.push('\n');
    xml.push_str("  <GetQueueAttributesResult>\n");

    for (name, value) in attributes {
        xml.push_str("    <Attribute>\n");
        xml.push_str(&format!("      <Name>{}</Name>\n", escape_xml(name)));
        xml.push_str(&format!("      <Value>{}</Value>\n", escape_xml(value)));
        xml.push_str("    </Attribute>\n");
    }

    xml.push_str("  </GetQueueAttributesResult>\n");
    xml.push_str("  <ResponseMetadata>\n");
    xml.push_str(&format!("    <RequestId>{}</RequestId>\n", Uuid::new_v4()));
    xml.push_str("  </ResponseMetadata>\n");
    xml.push_str("</GetQueueAttributesResponse>");

    xml
}

/// Escape XML special characters.
fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
