diesel::table! {
    users (id) {
        id -> Integer,
        name -> Text,
        joined -> Timestamp,
    }
}

diesel::table! {
    words (id) {
        id -> Integer,
        word -> Text,
        frequency -> Integer,
        definition -> Nullable<Text>,
        pronunciation -> Nullable<Text>,
        added -> Timestamp,
    }
}

diesel::table! {
    videos (id) {
        id -> Integer,
        title -> Text,
        added -> Timestamp,
    }
}

diesel::table! {
    video_words (video_id, word_id) {
        video_id -> Integer,
        word_id -> Integer,
    }
}

diesel::table! {
    levels (id) {
        id -> Integer,
        number -> Integer,
        name -> Text,
        word_count -> Integer,
        min_frequency -> Integer,
        max_frequency -> Integer,
        created -> Timestamp,
    }
}

diesel::table! {
    level_words (level_id, word_id) {
        level_id -> Integer,
        word_id -> Integer,
        rank -> Integer,
    }
}

diesel::table! {
    user_words (user_id, word_id) {
        user_id -> Integer,
        word_id -> Integer,
        known -> Bool,
        last_updated -> Timestamp,
    }
}

diesel::table! {
    sessions (id) {
        id -> Integer,
        user_id -> Integer,
        scope -> Text,
        target_id -> Nullable<Integer>,
        started -> Timestamp,
        completed -> Nullable<Timestamp>,
        total_cards -> Integer,
        correct_answers -> Integer,
        active -> Bool,
    }
}

diesel::table! {
    session_progress (id) {
        id -> Integer,
        session_id -> Integer,
        word_id -> Integer,
        status -> Text,
        attempts -> Integer,
        first_answer -> Nullable<Timestamp>,
        last_answer -> Nullable<Timestamp>,
    }
}

diesel::table! {
    problem_words (user_id, word_id) {
        user_id -> Integer,
        word_id -> Integer,
        times_incorrect -> Integer,
        last_seen -> Timestamp,
    }
}

diesel::joinable!(video_words -> videos (video_id));
diesel::joinable!(video_words -> words (word_id));
diesel::joinable!(level_words -> levels (level_id));
diesel::joinable!(level_words -> words (word_id));
diesel::joinable!(user_words -> users (user_id));
diesel::joinable!(user_words -> words (word_id));
diesel::joinable!(sessions -> users (user_id));
diesel::joinable!(session_progress -> sessions (session_id));
diesel::joinable!(session_progress -> words (word_id));
diesel::joinable!(problem_words -> users (user_id));
diesel::joinable!(problem_words -> words (word_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    words,
    videos,
    video_words,
    levels,
    level_words,
    user_words,
    sessions,
    session_progress,
    problem_words,
);
