pub(super) fn init_metrics() {
    describe_toplevel();
    describe_ingest();
    describe_process();
    describe_object_storage();
    describe_repo();
}

fn describe_toplevel() {
    metrics::describe_counter!(FILES, "How many videos have been uploaded to tubely");
    metrics::describe_counter!(
        ORPHAN_CLEANUP,
        "How many stored objects were removed because their record could not be updated"
    );
}

pub(crate) const FILES: &str = "tubely.files";
pub(crate) const ORPHAN_CLEANUP: &str = "tubely.orphan.cleanup";

fn describe_ingest() {
    metrics::describe_histogram!(
        INGEST_STAGE,
        "Timings for writing an upload to the temporary directory"
    );
    metrics::describe_histogram!(
        INGEST_REMUX,
        "Timings for rewriting uploads with fast-start metadata"
    );
    metrics::describe_histogram!(
        INGEST_PROBE,
        "Timings for reading dimensions from processed uploads"
    );
    metrics::describe_histogram!(
        INGEST_SAVE,
        "Timings for saving processed uploads to object storage"
    );
    metrics::describe_histogram!(
        INGEST_PERSIST,
        "Timings for recording the playback URL on the video"
    );
}

pub(crate) const INGEST_STAGE: &str = "tubely.ingest.stage";
pub(crate) const INGEST_REMUX: &str = "tubely.ingest.remux";
pub(crate) const INGEST_PROBE: &str = "tubely.ingest.probe";
pub(crate) const INGEST_SAVE: &str = "tubely.ingest.save";
pub(crate) const INGEST_PERSIST: &str = "tubely.ingest.persist";

fn describe_process() {
    metrics::describe_counter!(
        PROCESS_START,
        "How many subprocesses tubely has launched"
    );
    metrics::describe_histogram!(
        PROCESS_DURATION,
        "Timings for how long subprocesses take to complete"
    );
    metrics::describe_counter!(PROCESS_END, "How many subprocesses have completed");
}

pub(crate) const PROCESS_START: &str = "tubely.process.start";
pub(crate) const PROCESS_DURATION: &str = "tubely.process.duration";
pub(crate) const PROCESS_END: &str = "tubely.process.end";

fn describe_object_storage() {
    metrics::describe_histogram!(
        OBJECT_STORAGE_PUT,
        "Timings for uploading objects to object storage"
    );
    metrics::describe_histogram!(
        OBJECT_STORAGE_DELETE,
        "Timings for deleting objects from object storage"
    );
}

pub(crate) const OBJECT_STORAGE_PUT: &str = "tubely.object-storage.put";
pub(crate) const OBJECT_STORAGE_DELETE: &str = "tubely.object-storage.delete";

fn describe_repo() {
    metrics::describe_histogram!(
        SLED_OPERATION,
        "Timings for individual sled operations"
    );
}

pub(crate) const SLED_OPERATION: &str = "tubely.sled.operation";
