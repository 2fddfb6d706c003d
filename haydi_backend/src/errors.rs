error_chain! {
    foreign_links {
        ParseIntError(::std::num::ParseIntError);
        StdIoError(::std::io::Error);
        VarError(::std::env::VarError);
        Diesel(::diesel::result::Error);
        DieselConnection(::diesel::ConnectionError);
        R2d2(::diesel::r2d2::PoolError);
    }
    errors {
        InvalidInput {
            description("Provided input is invalid.")
            display("Provided input is invalid.")
        }
        EmptyCorpus {
            description("The corpus has no words")
            display("Can't build levels out of an empty corpus!")
        }
        NoEligibleWords {
            description("No eligible words in this scope")
            display("Nothing left to study here: every word in this scope is already known.")
        }
        WordNotFound(id: i32) {
            description("No such word")
            display("No word with id {} exists.", id)
        }
        SessionNotFound(id: i32) {
            description("No such session")
            display("No session with id {} exists.", id)
        }
        UserNotFound(id: i32) {
            description("No such user")
            display("No user with id {} exists.", id)
        }
        ConcurrentRebuild {
            description("Another level rebuild holds the write lock")
            display("Another level rebuild is still running; try again when it has finished.")
        }
        DatabaseOdd(reason: &'static str) {
            description("There's something wrong with the contents of the DB vs. how it should be!")
            display("There's something wrong with the contents of the DB vs. how it should be! {}", reason)
        }
    }
}
