mod book_detail;
mod book_form;
mod book_list;
mod borrow_form;
mod borrow_summary;

pub use book_detail::BookDetailView;
pub use book_form::BookFormView;
pub use book_list::BookListView;
pub use borrow_form::BorrowFormView;
pub use borrow_summary::BorrowSummaryView;
