//! Canned requests and backend payloads shared by the integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};

use outreach_poller::models::request::{CoffeeChatPrepRequest, ContactSearchRequest};

pub const PROFILE_URL: &str = "https://linkedin.com/in/test";
pub const PDF_URL: &str = "https://files.example.com/coffee-chat/abc123.pdf";

pub fn coffee_chat_request() -> CoffeeChatPrepRequest {
    CoffeeChatPrepRequest {
        linkedin_url: PROFILE_URL.to_string(),
    }
}

pub fn contact_search_request() -> ContactSearchRequest {
    ContactSearchRequest {
        company: "Acme Robotics".to_string(),
        job_title: "Software Engineer".to_string(),
        location: "Seattle, WA".to_string(),
        max_contacts: 5,
        college_alumni: None,
    }
}

pub fn coffee_chat_result(pdf_url: &str) -> Value {
    json!({
        "status": "completed",
        "pdfUrl": pdf_url,
        "contact": {"firstName": "Test", "lastName": "User", "company": "Acme Robotics"},
        "talkingPoints": ["Ask about the robotics roadmap"]
    })
}

pub fn contact_search_result() -> Value {
    json!({
        "status": "completed",
        "contacts": [
            {"firstName": "Grace", "lastName": "Hopper", "email": "grace@acme.test"},
            {"firstName": "Katherine", "lastName": "Johnson"}
        ],
        "total": 2
    })
}
