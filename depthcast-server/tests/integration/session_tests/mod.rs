mod test_ice_candidates;
mod test_offer_answer;
mod test_shutdown;
