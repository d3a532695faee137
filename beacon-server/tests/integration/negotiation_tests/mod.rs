mod test_queued_renegotiation_coalesces;
