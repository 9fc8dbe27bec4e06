use askama::Template;

#[derive(Template)]
#[template(path = "index.html")]
pub(crate) struct Index {
    pub(crate) prob_thresh: f64,
    pub(crate) max_upload_mib: usize,
}
