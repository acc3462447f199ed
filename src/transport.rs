/// Trait for RFID reader communication backends.
/// Implement this trait for different transports (serial port, pipes, mocks).
///
/// Reads must not block for long: the scan loop polls
/// [`bytes_available`](RfidTransport::bytes_available) and only reads when
/// something is there, checking its stop flag in between.
pub trait RfidTransport: Send + 'static {
    /// Error type for transport operations
    type Error: std::fmt::Debug + Send;

    /// Write data to the transport
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Read whatever is available into `buf`; `Ok(0)` means nothing yet
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Number of bytes that can be read without waiting
    fn bytes_available(&mut self) -> Result<usize, Self::Error>;

    /// Clear the input buffer
    fn clear_input(&mut self) -> Result<(), Self::Error>;

    /// Release the underlying device.
    ///
    /// Dropping a transport without calling `close` must release it too.
    fn close(&mut self) -> Result<(), Self::Error>;
}

/// Opens transports by endpoint name
pub trait TransportOpener {
    type Transport: RfidTransport;

    /// Open `endpoint` at `baud_rate`. `flags` are passed through for
    /// backends that understand them.
    fn open(
        &mut self,
        endpoint: &str,
        baud_rate: u32,
        flags: u32,
    ) -> Result<Self::Transport, <Self::Transport as RfidTransport>::Error>;
}
