#![allow(missing_docs)]

pub(crate) mod gateway;
pub(crate) mod html;
pub(crate) mod http;

pub(crate) use gateway::{StubGateway, gateway_state, transaction};
pub(crate) use html::{assert_valid_html, parse_html_document, parse_html_fragment};
pub(crate) use http::{assert_status_ok, get_header};
