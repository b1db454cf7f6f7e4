
#[cfg(test)]
mod case_tests;
#[cfg(test)]
mod checkin_tests;
#[cfg(test)]
mod document_tests;
#[cfg(test)]
mod health_tests;
#[cfg(test)]
mod message_tests;
#[cfg(test)]
mod user_tests;
