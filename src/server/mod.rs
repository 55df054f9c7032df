pub(crate) mod cookies;
pub(crate) mod handler;
pub(crate) mod intercept;
pub(crate) mod registry;
pub(crate) mod request;
pub(crate) mod response;
