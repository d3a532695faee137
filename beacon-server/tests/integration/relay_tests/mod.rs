mod test_concurrent_join_and_publish_wires_joiner;
mod test_duplicate_publish_is_deduplicated;
mod test_late_joiner_receives_existing_tracks;
mod test_source_disconnect_removes_subscriptions;
