pub mod config {
    pub mod run_config;
}

pub mod detection {
    pub mod domain {
        pub mod face_detector;
        pub mod face_embedding_service;
        pub mod mask_classifier;
        pub mod matcher;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod clip_recorder;
    pub mod control_signal;
    pub mod detection_engine;
    pub mod detection_record;
    pub mod overlay;
    pub mod pipeline_logger;
    pub mod report_generator;
    pub mod sampling;
    pub mod trajectory_tracker;
    pub mod worker;

    #[cfg(test)]
    pub(crate) mod test_support;
}

pub mod shared {
    pub mod artifact_path;
    pub mod constants;
    pub mod embedding;
    pub mod face_box;
    pub mod frame;
    pub mod video_metadata;
}

pub mod video {
    pub mod domain {
        pub mod image_reader;
        pub mod image_writer;
        pub mod video_reader;
        pub mod video_writer;
    }
    pub mod infrastructure {
        pub mod ffmpeg_reader;
        pub mod ffmpeg_writer;
        pub mod image_file_reader;
        pub mod image_file_writer;
    }
}
