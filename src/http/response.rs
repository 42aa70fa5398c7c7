/// Status of the single response a connection sends.
///
/// - `Ok` (200): the requested file follows the status line
/// - `BadRequest` (400): the request line was malformed or too large
/// - `NotFound` (404): no regular file at the resolved path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 400 Bad Request
    BadRequest,
    /// 404 Not Found
    NotFound,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use pylon::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
        }
    }

    /// The complete response head: an HTTP/1.0 status line followed by the
    /// empty line that ends the (absent) header block.
    pub fn status_line(&self) -> &'static [u8] {
        match self {
            StatusCode::Ok => b"HTTP/1.0 200 OK\r\n\r\n",
            StatusCode::BadRequest => b"HTTP/1.0 400 Bad Request\r\n\r\n",
            StatusCode::NotFound => b"HTTP/1.0 404 Not Found\r\n\r\n",
        }
    }
}
