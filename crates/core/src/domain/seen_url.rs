// Seen-URL dedup set (spec §3)
//
// Per-root-job set of normalized URLs already enqueued. The unique index
// `(root_job_id, url)` is what makes `mark_url_seen` an atomic
// insert-or-ignore; this struct is just the row shape for storage impls.

#[derive(Debug, Clone)]
pub struct JobSeenUrl {
    pub root_job_id: String,
    pub url: String,
    pub seen_at: i64,
}
